use dialoguer::{Confirm, theme::SimpleTheme};

/// Asks the user whether to go ahead
pub(crate) trait Confirmer {
    /// `true` only for an explicit yes; any prompt failure counts as "no".
    fn confirm(&self, prompt: &str) -> bool;
}

/// Interactive y/N prompt on the terminal
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DialoguerConfirmer;

impl Confirmer for DialoguerConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        match Confirm::with_theme(&SimpleTheme)
            .with_prompt(prompt)
            .default(false)
            .interact()
        {
            Ok(answer) => answer,
            Err(e) => {
                tracing::debug!(error = %e, "confirmation prompt failed");
                false
            }
        }
    }
}
