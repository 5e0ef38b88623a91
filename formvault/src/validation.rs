//! Structural validation
//!
//! Pure checks over templates, responses and branding. Each check reports
//! every violation it finds so the caller can present all of them at once.

use crate::database::{Answer, BrandingRecord, QuestionType, Response, Template};
use crate::error::{AppError, Result};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

/// One broken rule, located by section and question id where relevant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum Violation {
    #[error("template name is blank")]
    BlankTemplateName,

    #[error("section id {section_id} is used more than once")]
    DuplicateSectionId { section_id: String },

    #[error("question id {question_id} is used more than once in section {section_id}")]
    DuplicateQuestionId {
        section_id: String,
        question_id: String,
    },

    #[error("question {question_id} has a blank label")]
    BlankQuestionLabel {
        section_id: String,
        question_id: String,
    },

    #[error("{question_type} question {question_id} needs at least one option")]
    MissingOptions {
        section_id: String,
        question_id: String,
        question_type: QuestionType,
    },

    #[error("question {question_id} has a blank option at position {index}")]
    BlankOption {
        section_id: String,
        question_id: String,
        index: usize,
    },

    #[error("{question_type} question {question_id} cannot have options")]
    UnexpectedOptions {
        section_id: String,
        question_id: String,
        question_type: QuestionType,
    },

    #[error("question {question_id} must keep at least {minimum} options")]
    OptionMinimum { question_id: String, minimum: usize },

    #[error("required question {question_id} ({label}) has no answer")]
    RequiredAnswerMissing { question_id: String, label: String },

    #[error("answer to {question_id} has the wrong shape for a {question_type} question")]
    AnswerShapeMismatch {
        question_id: String,
        question_type: QuestionType,
    },

    #[error("answer {value:?} is not an option of question {question_id}")]
    UnknownOption { question_id: String, value: String },

    #[error("branding field {field} is required")]
    MissingBrandingField { field: &'static str },
}

/// Convert collected violations into a `ValidationFailed` error
pub fn ensure_valid(violations: Vec<Violation>) -> Result<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationFailed(violations))
    }
}

pub fn validate_template(template: &Template) -> Vec<Violation> {
    let mut violations = Vec::new();

    if template.name.trim().is_empty() {
        violations.push(Violation::BlankTemplateName);
    }

    let mut section_ids = HashSet::new();
    for section in &template.sections {
        if !section_ids.insert(section.id.as_str()) {
            violations.push(Violation::DuplicateSectionId {
                section_id: section.id.clone(),
            });
        }

        // Sections without questions are allowed
        let mut question_ids = HashSet::new();
        for question in &section.questions {
            if !question_ids.insert(question.id.as_str()) {
                violations.push(Violation::DuplicateQuestionId {
                    section_id: section.id.clone(),
                    question_id: question.id.clone(),
                });
            }

            if question.label.trim().is_empty() {
                violations.push(Violation::BlankQuestionLabel {
                    section_id: section.id.clone(),
                    question_id: question.id.clone(),
                });
            }

            match (&question.options, question.question_type.is_choice()) {
                (Some(options), true) if !options.is_empty() => {
                    for (index, option) in options.iter().enumerate() {
                        if option.trim().is_empty() {
                            violations.push(Violation::BlankOption {
                                section_id: section.id.clone(),
                                question_id: question.id.clone(),
                                index,
                            });
                        }
                    }
                }
                (_, true) => violations.push(Violation::MissingOptions {
                    section_id: section.id.clone(),
                    question_id: question.id.clone(),
                    question_type: question.question_type,
                }),
                (Some(_), false) => violations.push(Violation::UnexpectedOptions {
                    section_id: section.id.clone(),
                    question_id: question.id.clone(),
                    question_type: question.question_type,
                }),
                (None, false) => {}
            }
        }
    }

    violations
}

/// Check a response against the template it fills.
pub fn validate_response(template: &Template, response: &Response) -> Vec<Violation> {
    let mut violations = Vec::new();

    for question in template.questions() {
        let answer = response.answers.get(&question.id);
        let is_checkbox = question.question_type == QuestionType::Checkbox;

        match answer {
            Some(Answer::Choices(_)) if !is_checkbox => {
                violations.push(Violation::AnswerShapeMismatch {
                    question_id: question.id.clone(),
                    question_type: question.question_type,
                });
                continue;
            }
            Some(Answer::Text(_)) if is_checkbox => {
                violations.push(Violation::AnswerShapeMismatch {
                    question_id: question.id.clone(),
                    question_type: question.question_type,
                });
                continue;
            }
            None if is_checkbox => {
                // Checkbox answers are always recorded, possibly empty
                violations.push(Violation::AnswerShapeMismatch {
                    question_id: question.id.clone(),
                    question_type: question.question_type,
                });
                continue;
            }
            _ => {}
        }

        let unanswered = answer.map_or(true, Answer::is_empty);
        if question.required && unanswered {
            violations.push(Violation::RequiredAnswerMissing {
                question_id: question.id.clone(),
                label: question.label.clone(),
            });
        }

        if let (Some(answer), Some(options)) = (answer, &question.options) {
            let chosen: Vec<&String> = match answer {
                Answer::Text(text) if text.is_empty() => Vec::new(),
                Answer::Text(text) => vec![text],
                Answer::Choices(choices) => choices.iter().collect(),
            };
            for value in chosen {
                if !options.contains(value) {
                    violations.push(Violation::UnknownOption {
                        question_id: question.id.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
    }

    violations
}

pub fn validate_branding(branding: &BrandingRecord) -> Vec<Violation> {
    [
        ("companyName", &branding.company_name),
        ("phone", &branding.phone),
        ("address", &branding.address),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| Violation::MissingBrandingField { field })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Question, Section};
    use std::collections::BTreeMap;

    fn question(id: &str, question_type: QuestionType, options: Option<&[&str]>) -> Question {
        Question {
            id: id.to_string(),
            question_type,
            label: format!("Question {}", id),
            required: false,
            options: options.map(|o| o.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn template(questions: Vec<Question>) -> Template {
        Template {
            id: None,
            name: "Intake".to_string(),
            sections: vec![Section {
                id: "s1".to_string(),
                title: "Main".to_string(),
                description: String::new(),
                questions,
            }],
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_valid_template() {
        let t = template(vec![
            question("q1", QuestionType::Text, None),
            question("q2", QuestionType::Select, Some(&["a"])),
            question("q3", QuestionType::Signature, None),
        ]);
        assert!(validate_template(&t).is_empty());
        assert!(ensure_valid(validate_template(&t)).is_ok());
    }

    #[test]
    fn test_empty_section_is_allowed() {
        let t = template(Vec::new());
        assert!(validate_template(&t).is_empty());
    }

    #[test]
    fn test_reports_every_violation() {
        let mut t = template(vec![
            question("q1", QuestionType::Radio, Some(&[])),
            question("q1", QuestionType::Checkbox, None),
            question("q3", QuestionType::Text, Some(&["x"])),
            question("q4", QuestionType::Select, Some(&["ok", " "])),
        ]);
        t.name = "  ".to_string();
        t.sections.push(t.sections[0].clone());
        t.sections[1].questions.clear();

        let violations = validate_template(&t);

        assert!(violations.contains(&Violation::BlankTemplateName));
        assert!(violations.contains(&Violation::DuplicateSectionId {
            section_id: "s1".to_string()
        }));
        assert!(violations.contains(&Violation::DuplicateQuestionId {
            section_id: "s1".to_string(),
            question_id: "q1".to_string()
        }));
        assert!(violations.contains(&Violation::MissingOptions {
            section_id: "s1".to_string(),
            question_id: "q1".to_string(),
            question_type: QuestionType::Radio
        }));
        assert!(violations.contains(&Violation::UnexpectedOptions {
            section_id: "s1".to_string(),
            question_id: "q3".to_string(),
            question_type: QuestionType::Text
        }));
        assert!(violations.contains(&Violation::BlankOption {
            section_id: "s1".to_string(),
            question_id: "q4".to_string(),
            index: 1
        }));
        assert_eq!(violations.len(), 7);

        match ensure_valid(violations) {
            Err(AppError::ValidationFailed(found)) => assert_eq!(found.len(), 7),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_response_checks() {
        let mut required = question("q1", QuestionType::Text, None);
        required.required = true;
        let mut boxes = question("q2", QuestionType::Checkbox, Some(&["a", "b"]));
        boxes.required = true;
        let t = template(vec![
            required,
            boxes,
            question("q3", QuestionType::Radio, Some(&["yes", "no"])),
        ]);

        let mut answers = BTreeMap::new();
        answers.insert("q2".to_string(), Answer::Choices(Vec::new()));
        answers.insert("q3".to_string(), Answer::Text("maybe".to_string()));
        let response = Response::new(1, None, answers);

        let violations = validate_response(&t, &response);
        assert_eq!(violations.len(), 3);
        assert!(violations.contains(&Violation::RequiredAnswerMissing {
            question_id: "q1".to_string(),
            label: "Question q1".to_string()
        }));
        assert!(violations.contains(&Violation::UnknownOption {
            question_id: "q3".to_string(),
            value: "maybe".to_string()
        }));
    }

    #[test]
    fn test_response_shapes() {
        let t = template(vec![
            question("q1", QuestionType::Text, None),
            question("q2", QuestionType::Checkbox, Some(&["a"])),
        ]);

        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), Answer::Choices(vec!["x".to_string()]));
        let violations = validate_response(&t, &Response::new(1, None, answers));

        // Wrong shape for q1, missing checkbox list for q2
        assert_eq!(violations.len(), 2);
        assert!(violations
            .iter()
            .all(|v| matches!(v, Violation::AnswerShapeMismatch { .. })));
    }

    #[test]
    fn test_branding_required_fields() {
        let branding = BrandingRecord {
            company_name: "Acme".to_string(),
            ..Default::default()
        };
        let violations = validate_branding(&branding);
        assert_eq!(
            violations,
            vec![
                Violation::MissingBrandingField { field: "phone" },
                Violation::MissingBrandingField { field: "address" },
            ]
        );
    }
}
