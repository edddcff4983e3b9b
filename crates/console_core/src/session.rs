use shared::domain::{Ciphertext, UserId};

/// Text shown in place of a plaintext when the service denies access.
pub const ACCESS_DENIED_TEXT: &str = "ACCESS DENIED";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DecryptionOutcome {
    #[default]
    Hidden,
    Revealed(String),
    Denied,
}

impl DecryptionOutcome {
    /// What the result area displays, if it is visible at all.
    pub fn display_text(&self) -> Option<&str> {
        match self {
            DecryptionOutcome::Hidden => None,
            DecryptionOutcome::Revealed(message) => Some(message.as_str()),
            DecryptionOutcome::Denied => Some(ACCESS_DENIED_TEXT),
        }
    }
}

/// What the console has produced so far in this session.
///
/// Each field has exactly one writing action: the ciphertext belongs to
/// encryption (or an explicit reset), the user and outcome to decryption, and
/// the last issued user to credential issuance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    current_ciphertext: Option<Ciphertext>,
    current_user_id: Option<UserId>,
    last_issued_user: Option<UserId>,
    decryption_outcome: DecryptionOutcome,
}

impl SessionState {
    pub fn current_ciphertext(&self) -> Option<&Ciphertext> {
        self.current_ciphertext.as_ref()
    }

    pub fn current_user_id(&self) -> Option<&UserId> {
        self.current_user_id.as_ref()
    }

    pub fn last_issued_user(&self) -> Option<&UserId> {
        self.last_issued_user.as_ref()
    }

    pub fn decryption_outcome(&self) -> &DecryptionOutcome {
        &self.decryption_outcome
    }

    /// User to decrypt as when none is given: the latest credential holder,
    /// then whoever decrypted last.
    pub fn default_decrypt_user(&self) -> Option<&UserId> {
        self.last_issued_user
            .as_ref()
            .or(self.current_user_id.as_ref())
    }

    pub(crate) fn store_ciphertext(&mut self, ciphertext: Ciphertext) {
        self.current_ciphertext = Some(ciphertext);
    }

    pub(crate) fn reset(&mut self) {
        self.current_ciphertext = None;
        self.decryption_outcome = DecryptionOutcome::Hidden;
    }

    pub(crate) fn set_current_user(&mut self, user_id: UserId) {
        self.current_user_id = Some(user_id);
    }

    pub(crate) fn record_issued_user(&mut self, user_id: UserId) {
        self.last_issued_user = Some(user_id);
    }

    pub(crate) fn set_decryption_outcome(&mut self, outcome: DecryptionOutcome) {
        self.decryption_outcome = outcome;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_outcome_shows_fixed_text() {
        assert_eq!(DecryptionOutcome::Denied.display_text(), Some("ACCESS DENIED"));
        assert_eq!(DecryptionOutcome::Hidden.display_text(), None);
        assert_eq!(
            DecryptionOutcome::Revealed("patient record".to_string()).display_text(),
            Some("patient record")
        );
    }

    #[test]
    fn default_decrypt_user_prefers_last_issued() {
        let mut state = SessionState::default();
        assert!(state.default_decrypt_user().is_none());

        state.set_current_user(UserId::from("bob"));
        assert_eq!(state.default_decrypt_user(), Some(&UserId::from("bob")));

        state.record_issued_user(UserId::from("alice"));
        assert_eq!(state.default_decrypt_user(), Some(&UserId::from("alice")));
    }

    #[test]
    fn reset_clears_ciphertext_and_hides_outcome() {
        let mut state = SessionState::default();
        state.store_ciphertext(Ciphertext::from("ct"));
        state.set_decryption_outcome(DecryptionOutcome::Denied);
        state.set_current_user(UserId::from("bob"));

        state.reset();

        assert!(state.current_ciphertext().is_none());
        assert_eq!(state.decryption_outcome(), &DecryptionOutcome::Hidden);
        assert_eq!(state.current_user_id(), Some(&UserId::from("bob")));
    }
}
