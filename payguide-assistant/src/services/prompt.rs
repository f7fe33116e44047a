//! System instruction and question text sent to the model.

use crate::config::AssistantSettings;
use crate::models::ChatMessage;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_instruction: String,
    disclaimer: String,
    history_turns: usize,
    enforce_disclaimer: bool,
}

impl PromptBuilder {
    pub fn new(settings: &AssistantSettings) -> Self {
        Self {
            system_instruction: settings.system_instruction.trim().to_string(),
            disclaimer: settings.disclaimer.trim().to_string(),
            history_turns: settings.history_turns,
            enforce_disclaimer: settings.enforce_disclaimer,
        }
    }

    pub fn history_turns(&self) -> usize {
        self.history_turns
    }

    /// The configured instruction plus the requirement to close with the disclaimer.
    pub fn system_instruction(&self) -> String {
        if self.disclaimer.is_empty() {
            return self.system_instruction.clone();
        }

        format!(
            "{}\n\nEnd every answer with this exact sentence on its own line:\n{}",
            self.system_instruction, self.disclaimer
        )
    }

    /// Prior turns as plain text followed by the question.
    ///
    /// Without history the question is forwarded unchanged.
    pub fn render_question(&self, history: &[ChatMessage], question: &str) -> String {
        if history.is_empty() {
            return question.to_string();
        }

        let mut prompt = String::from("Conversation so far:\n");
        for message in history {
            prompt.push_str(message.role.label());
            prompt.push_str(": ");
            prompt.push_str(message.content.trim());
            prompt.push('\n');
        }
        prompt.push_str("\nNew question:\n");
        prompt.push_str(question);
        prompt
    }

    /// Trim the model output and make sure it closes with the disclaimer.
    pub fn finalize_answer(&self, text: &str) -> String {
        let answer = text.trim_end();

        if !self.enforce_disclaimer || self.disclaimer.is_empty() {
            return answer.to_string();
        }

        if answer.ends_with(&self.disclaimer) {
            answer.to_string()
        } else if answer.is_empty() {
            self.disclaimer.clone()
        } else {
            format!("{}\n\n{}", answer, self.disclaimer)
        }
    }
}
