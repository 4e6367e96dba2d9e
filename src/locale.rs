//! User-facing page text
//!
//! The copy is Italian, as is the system prompt. Emergency numbers default
//! to the Italian ones and can be overridden per deployment.

use serde::Serialize;

/// Numbers shown in the warning banner and handed to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmergencyContacts {
    pub emergency_number: String,
    pub helpline_name: String,
    pub helpline_number: String,
}

impl Default for EmergencyContacts {
    fn default() -> Self {
        Self {
            emergency_number: "112".to_string(),
            helpline_name: "Telefono Amico".to_string(),
            helpline_number: "199.284.284".to_string(),
        }
    }
}

impl EmergencyContacts {
    pub fn as_pairs(&self) -> [(&str, &str); 2] {
        [
            ("Emergenza", self.emergency_number.as_str()),
            (self.helpline_name.as_str(), self.helpline_number.as_str()),
        ]
    }
}

/// Everything the page renders that is not part of the conversation
#[derive(Debug, Clone, Serialize)]
pub struct PageText {
    pub title: String,
    pub icon: &'static str,
    pub subtitle: &'static str,
    /// Markdown; bold spans carry the numbers
    pub disclaimer: String,
    pub api_key_label: &'static str,
    pub missing_key_warning: &'static str,
    pub get_key_hint: &'static str,
    pub get_key_url: &'static str,
    pub input_placeholder: &'static str,
    pub opening_spinner: &'static str,
    pub reply_spinner: &'static str,
    /// Button that stops the call in flight
    pub cancel_label: &'static str,
    pub connection_error: &'static str,
}

pub const MISSING_KEY_WARNING: &str =
    "Per iniziare, inserisci la tua Google API Key nella barra laterale a sinistra.";

const CONNECTION_ERROR: &str = "Qualcosa non va nella connessione. Riprova.";

impl PageText {
    pub fn italian(contacts: &EmergencyContacts) -> Self {
        Self {
            title: "SOS Calma".to_string(),
            icon: "🌿",
            subtitle: "Un respiro alla volta.",
            disclaimer: format!(
                "⚠️ **Nota Importante:** Questo è un supporto di auto-aiuto basato sull'IA. \
                 Non sostituisce un medico. In caso di emergenza o pericolo, chiama il **{}** \
                 o il {} **{}**.",
                contacts.emergency_number, contacts.helpline_name, contacts.helpline_number
            ),
            api_key_label: "Inserisci Google API Key",
            missing_key_warning: MISSING_KEY_WARNING,
            get_key_hint: "Non hai una chiave? Ottienila qui gratis",
            get_key_url: "https://aistudio.google.com/",
            input_placeholder: "Scrivi qui come ti senti o rispondi all'esercizio...",
            opening_spinner: "Respirando con te...",
            reply_spinner: "...",
            cancel_label: "Interrompi",
            connection_error: CONNECTION_ERROR,
        }
    }
}

/// Inline message shown when a model call fails
pub fn connection_error(detail: &str) -> String {
    format!("{CONNECTION_ERROR} Errore: {detail}")
}
