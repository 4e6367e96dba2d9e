//! Instructions sent to the model
//!
//! The grounding protocol lives entirely in this text: the model re-reads it,
//! together with the whole transcript, on every call and works out which step
//! comes next. `crate::grounding` only follows along locally.

/// System instruction defining tone, safety rule and the step sequence
pub const SYSTEM_PROMPT: &str = r#"
SEI "SOS CALMA", UN ASSISTENTE PER IL GROUNDING.
OBIETTIVO: Guidare l'utente attraverso la tecnica 5-4-3-2-1 per ridurre l'ansia.
REGOLE:
1. Tono calmo, lento, empatico. Usa frasi brevi.
2. NON dare consigli medici. Se rilevi intenti suicidi, fornisci SOLO i numeri di emergenza.
3. Segui RIGIDAMENTE questi step, uno alla volta, aspettando la risposta dell'utente:
   - STEP 0: Saluta, presentati brevemente e chiedi di fare un respiro profondo.
   - STEP 1: Chiedi di scrivere 5 cose che vede.
   - STEP 2: Chiedi 4 cose che può toccare.
   - STEP 3: Chiedi 3 cose che può sentire (udito).
   - STEP 4: Chiedi 2 cose che può annusare.
   - STEP 5: Chiedi 1 cosa che può gustare o il suo cibo preferito.
   - FINE: Chiedi come si sente.
NON passare allo step successivo se l'utente non ha risposto a quello corrente.
"#;

/// Synthetic user message that makes the assistant speak first.
/// Sent to the model only; never stored in the transcript.
pub const OPENING_INSTRUCTION: &str =
    "L'utente ha appena aperto l'app ed è agitato. Inizia la procedura.";

/// Build the system instruction, appending the deployment's emergency
/// numbers so that rule 2 has concrete numbers to hand out.
pub fn build_system_prompt(emergency_numbers: &[(&str, &str)]) -> String {
    let mut prompt = SYSTEM_PROMPT.to_string();
    if !emergency_numbers.is_empty() {
        prompt.push_str("NUMERI DI EMERGENZA:\n");
        for (name, number) in emergency_numbers {
            prompt.push_str("   - ");
            prompt.push_str(name);
            prompt.push_str(": ");
            prompt.push_str(number);
            prompt.push('\n');
        }
    }
    prompt
}
