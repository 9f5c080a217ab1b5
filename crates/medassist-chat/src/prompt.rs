//! Prompt templates and fixed answers.

use crate::types::ChatMessage;
use medassist_core::Error;

pub const SYSTEM_PROMPT: &str = "Vous êtes un assistant médical expert qui aide les médecins à trouver des informations précises. Utilisez uniquement le contexte fourni pour répondre à la question. Si l'information n'est pas présente dans le contexte, indiquez-le clairement. N'inventez pas d'information.";

/// Returned when the chat service answered with an error status.
pub const FALLBACK_ANSWER: &str =
    "Désolé, je n'ai pas pu générer une réponse. Veuillez réessayer.";

/// Returned when the chat service could not be reached or its reply was unusable.
pub const ERROR_ANSWER: &str = "Une erreur s'est produite lors de la génération de la réponse.";

/// Returned when retrieval found nothing; generation is not attempted.
pub const NO_CONTEXT_ANSWER: &str =
    "Aucun passage pertinent n'a été trouvé dans le document indexé pour répondre à cette question.";

/// System + user messages for a grounded answer.
pub fn build_messages(question: &str, contexts: &[String]) -> Vec<ChatMessage> {
    let context_text = contexts.join("\n\n");
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Contexte :\n{}\n\nQuestion : {}\n\nRéponse :",
            context_text, question
        )),
    ]
}

/// Fixed answer shown to the user in place of a failed generation.
pub fn fallback_answer(error: &Error) -> &'static str {
    match error {
        Error::GenerationService(failure) if failure.status.is_some() => FALLBACK_ANSWER,
        _ => ERROR_ANSWER,
    }
}
