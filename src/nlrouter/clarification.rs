//! Clarification request payload (spec §4.8).

#[derive(Debug, Clone)]
pub struct ClarificationRequest {
    pub questions: Vec<String>,
    pub options: Option<Vec<String>>,
    /// The original user input this clarification was raised against, so
    /// [`super::NaturalLanguageRouter::handle_clarification`] can merge the
    /// eventual answer back into it and re-route.
    pub context: String,
    pub required: bool,
}
