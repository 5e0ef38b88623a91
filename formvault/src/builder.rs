//! In-memory template editing
//!
//! The operations of the form designer, independent of any view. Section
//! and question ids are generated here; the store only assigns template ids.

use crate::config::{DEFAULT_OPTIONS, MIN_REMOVABLE_OPTIONS};
use crate::database::{Question, QuestionType, Section, Template};
use crate::error::{AppError, Result};
use crate::validation::Violation;
use uuid::Uuid;

fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

impl Template {
    /// A new, unsaved template with no sections
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            sections: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Append a section and return its id
    pub fn add_section(&mut self, title: impl Into<String>, description: impl Into<String>) -> String {
        let id = new_id("section");
        self.sections.push(Section {
            id: id.clone(),
            title: title.into(),
            description: description.into(),
            questions: Vec::new(),
        });
        id
    }

    pub fn remove_section(&mut self, section_id: &str) -> Result<Section> {
        let position = self
            .sections
            .iter()
            .position(|s| s.id == section_id)
            .ok_or_else(|| AppError::not_found("Section", section_id))?;
        Ok(self.sections.remove(position))
    }

    pub fn section_mut(&mut self, section_id: &str) -> Result<&mut Section> {
        self.sections
            .iter_mut()
            .find(|s| s.id == section_id)
            .ok_or_else(|| AppError::not_found("Section", section_id))
    }

    /// Append a question of the given type to a section and return its id
    pub fn add_question(
        &mut self,
        section_id: &str,
        question_type: QuestionType,
        label: impl Into<String>,
    ) -> Result<String> {
        let section = self.section_mut(section_id)?;
        let id = new_id("question");
        section.questions.push(Question {
            id: id.clone(),
            question_type,
            label: label.into(),
            required: false,
            options: default_options(question_type),
        });
        Ok(id)
    }

    pub fn remove_question(&mut self, section_id: &str, question_id: &str) -> Result<Question> {
        let section = self.section_mut(section_id)?;
        let position = section
            .questions
            .iter()
            .position(|q| q.id == question_id)
            .ok_or_else(|| AppError::not_found("Question", question_id))?;
        Ok(section.questions.remove(position))
    }

    pub fn question_mut(&mut self, section_id: &str, question_id: &str) -> Result<&mut Question> {
        self.section_mut(section_id)?
            .questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .ok_or_else(|| AppError::not_found("Question", question_id))
    }
}

impl Question {
    /// Change the type, adding or dropping the options list as needed.
    ///
    /// Options survive a change between choice types.
    pub fn set_type(&mut self, question_type: QuestionType) {
        self.question_type = question_type;
        if !question_type.is_choice() {
            self.options = None;
        } else if self.options.as_ref().map_or(true, Vec::is_empty) {
            self.options = default_options(question_type);
        }
    }

    pub fn add_option(&mut self, text: impl Into<String>) -> Result<()> {
        let question_id = self.id.clone();
        self.options_mut(&question_id)?.push(text.into());
        Ok(())
    }

    pub fn update_option(&mut self, index: usize, text: impl Into<String>) -> Result<()> {
        let question_id = self.id.clone();
        let option = self
            .options_mut(&question_id)?
            .get_mut(index)
            .ok_or_else(|| AppError::not_found("Option", index))?;
        *option = text.into();
        Ok(())
    }

    /// Remove an option, refusing to go below the minimum.
    pub fn remove_option(&mut self, index: usize) -> Result<String> {
        let question_id = self.id.clone();
        let options = self.options_mut(&question_id)?;

        if options.len() <= MIN_REMOVABLE_OPTIONS {
            return Err(AppError::ValidationFailed(vec![Violation::OptionMinimum {
                question_id,
                minimum: MIN_REMOVABLE_OPTIONS,
            }]));
        }
        if index >= options.len() {
            return Err(AppError::not_found("Option", index));
        }

        Ok(options.remove(index))
    }

    fn options_mut(&mut self, question_id: &str) -> Result<&mut Vec<String>> {
        let question_type = self.question_type;
        match self.options.as_mut() {
            Some(options) if question_type.is_choice() => Ok(options),
            _ => Err(AppError::ValidationFailed(vec![Violation::UnexpectedOptions {
                section_id: String::new(),
                question_id: question_id.to_string(),
                question_type,
            }])),
        }
    }
}

fn default_options(question_type: QuestionType) -> Option<Vec<String>> {
    question_type
        .is_choice()
        .then(|| DEFAULT_OPTIONS.iter().map(|o| o.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_template;

    #[test]
    fn test_build_template() {
        let mut template = Template::new("Intake");
        let section = template.add_section("About you", "");
        let name = template.add_question(&section, QuestionType::Text, "Name").unwrap();
        let size = template.add_question(&section, QuestionType::Radio, "Size").unwrap();

        assert_ne!(name, size);
        assert_eq!(template.sections[0].questions.len(), 2);

        let radio = template.question_mut(&section, &size).unwrap();
        assert_eq!(radio.options.as_ref().unwrap().len(), 2);
        radio.add_option("Large").unwrap();
        radio.update_option(0, "Small").unwrap();
        assert_eq!(
            radio.options.as_deref().unwrap(),
            &["Small".to_string(), "Option 2".to_string(), "Large".to_string()][..]
        );

        assert!(validate_template(&template).is_empty());
    }

    #[test]
    fn test_remove_option_keeps_two() {
        let mut template = Template::new("Poll");
        let section = template.add_section("Main", "");
        let id = template
            .add_question(&section, QuestionType::Checkbox, "Pick")
            .unwrap();
        let question = template.question_mut(&section, &id).unwrap();
        question.add_option("Third").unwrap();

        assert_eq!(question.remove_option(0).unwrap(), "Option 1");

        let result = question.remove_option(0);
        assert!(matches!(result, Err(AppError::ValidationFailed(_))));
        assert_eq!(question.options.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_set_type_manages_options() {
        let mut template = Template::new("Poll");
        let section = template.add_section("Main", "");
        let id = template.add_question(&section, QuestionType::Text, "Q").unwrap();
        let question = template.question_mut(&section, &id).unwrap();

        assert!(question.add_option("nope").is_err());

        question.set_type(QuestionType::Select);
        assert_eq!(question.options.as_ref().unwrap().len(), 2);
        question.add_option("Three").unwrap();

        question.set_type(QuestionType::Radio);
        assert_eq!(question.options.as_ref().unwrap().len(), 3);

        question.set_type(QuestionType::Textarea);
        assert!(question.options.is_none());
    }

    #[test]
    fn test_remove_section_and_question() {
        let mut template = Template::new("T");
        let keep = template.add_section("Keep", "");
        let drop = template.add_section("Drop", "");
        let q = template.add_question(&keep, QuestionType::Signature, "Sign").unwrap();

        template.remove_section(&drop).unwrap();
        assert_eq!(template.sections.len(), 1);
        assert!(template.remove_section(&drop).is_err());

        template.remove_question(&keep, &q).unwrap();
        assert!(template.sections[0].questions.is_empty());
        assert!(matches!(
            template.remove_question(&keep, &q),
            Err(AppError::NotFound { .. })
        ));
    }
}
