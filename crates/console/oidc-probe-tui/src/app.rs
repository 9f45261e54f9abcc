use oidc_probe_core::{LogLevel, LogRecorder, OidcSettings};

/// Messages delivered to the render loop from background tasks and
/// event subscriptions.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Log {
        level: LogLevel,
        message: String,
        data: Option<String>,
    },
    RefreshFinished,
}

impl AppEvent {
    pub fn log(level: LogLevel, message: impl Into<String>, data: Option<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppScreen {
    Console,
    Settings,
}

/// Which token panel currently holds the selection highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSlot {
    Access,
    Id,
    Refresh,
}

impl TokenSlot {
    pub fn next(self) -> Self {
        match self {
            Self::Access => Self::Id,
            Self::Id => Self::Refresh,
            Self::Refresh => Self::Access,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Access => "Access Token",
            Self::Id => "ID Token",
            Self::Refresh => "Refresh Token",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Authority,
    ClientId,
    Scope,
    RedirectUri,
}

impl SettingsField {
    pub fn next(self) -> Self {
        match self {
            Self::Authority => Self::ClientId,
            Self::ClientId => Self::Scope,
            Self::Scope => Self::RedirectUri,
            Self::RedirectUri => Self::Authority,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Authority => Self::RedirectUri,
            Self::ClientId => Self::Authority,
            Self::Scope => Self::ClientId,
            Self::RedirectUri => Self::Scope,
        }
    }
}

/// Editable copy of the settings shown on the settings screen. Edits
/// stay here until the user saves, so closing the screen discards them.
#[derive(Debug, Clone)]
pub struct SettingsForm {
    pub authority: String,
    pub client_id: String,
    pub scope: String,
    pub redirect_uri: String,
    pub focus: SettingsField,
}

impl SettingsForm {
    pub fn from_settings(settings: &OidcSettings) -> Self {
        Self {
            authority: settings.authority.clone(),
            client_id: settings.client_id.clone(),
            scope: settings.scope.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            focus: SettingsField::Authority,
        }
    }

    pub fn to_settings(&self) -> OidcSettings {
        OidcSettings {
            authority: self.authority.trim().to_string(),
            client_id: self.client_id.trim().to_string(),
            scope: self.scope.trim().to_string(),
            redirect_uri: self.redirect_uri.trim().to_string(),
        }
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            SettingsField::Authority => &mut self.authority,
            SettingsField::ClientId => &mut self.client_id,
            SettingsField::Scope => &mut self.scope,
            SettingsField::RedirectUri => &mut self.redirect_uri,
        }
    }

    pub fn focused(&self) -> &str {
        match self.focus {
            SettingsField::Authority => &self.authority,
            SettingsField::ClientId => &self.client_id,
            SettingsField::Scope => &self.scope,
            SettingsField::RedirectUri => &self.redirect_uri,
        }
    }

    pub fn push(&mut self, c: char) {
        self.focused_mut().push(c);
    }

    pub fn backspace(&mut self) {
        self.focused_mut().pop();
    }
}

pub struct AppState {
    pub screen: AppScreen,
    pub settings: OidcSettings,
    pub form: SettingsForm,
    pub log: LogRecorder,
    pub selected_token: TokenSlot,
    pub refreshing: bool,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(settings: OidcSettings) -> Self {
        let form = SettingsForm::from_settings(&settings);
        Self {
            screen: AppScreen::Console,
            settings,
            form,
            log: LogRecorder::new(),
            selected_token: TokenSlot::Access,
            refreshing: false,
            should_quit: false,
        }
    }

    pub fn record(&mut self, level: LogLevel, message: impl Into<String>, data: Option<String>) {
        self.log.append(level, message, data);
    }

    pub fn open_settings(&mut self) {
        self.form = SettingsForm::from_settings(&self.settings);
        self.screen = AppScreen::Settings;
    }

    pub fn close_settings(&mut self) {
        self.screen = AppScreen::Console;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_form_edits_are_discarded_until_saved() {
        let mut app = AppState::new(OidcSettings::default());
        app.open_settings();
        app.form.focus = SettingsField::ClientId;
        app.form.push('x');
        app.close_settings();
        assert_ne!(app.settings.client_id, app.form.client_id);

        app.open_settings();
        assert_eq!(app.form.client_id, app.settings.client_id);
    }

    #[test]
    fn token_slots_cycle_through_all_three() {
        let start = TokenSlot::Access;
        assert_eq!(start.next().next().next(), start);
    }
}
