use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One multiple-choice question closing a lesson
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options` of the right answer
    pub correct_index: usize,
    pub explanation: String,
}

/// Body of a lesson: prose, a worked example and the quiz
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonContent {
    pub paragraphs: Vec<String>,
    pub example_title: String,
    pub example_content: String,
    pub quiz: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub duration: String,
    pub content: LessonContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub lessons: Vec<Lesson>,
}

/// Marketing details shown on a track landing page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackDetails {
    pub skills: Vec<String>,
    pub overview: String,
    pub target_audience: Vec<String>,
    pub prerequisites: Vec<String>,
    pub outcomes: Vec<String>,
}

/// A course track. Built once from the embedded catalog and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub long_description: String,
    pub details: TrackDetails,
    pub modules: Vec<Module>,
}

/// Track whose lessons are not written yet: only module titles are known
#[derive(Debug, Clone, Deserialize)]
pub struct TrackOutline {
    pub id: String,
    pub title: String,
    pub description: String,
    pub modules: Vec<String>,
}

impl Track {
    /// All lessons in module order
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.modules.iter().flat_map(|m| m.lessons.iter())
    }

    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    /// Expand an outline into a browsable track with one placeholder lesson per module
    pub fn from_outline(outline: &TrackOutline) -> Self {
        let modules = outline
            .modules
            .iter()
            .enumerate()
            .map(|(idx, title)| {
                let module_id = format!("{}-m{}", outline.id, idx + 1);
                let lesson_id = format!("{}-l1", module_id);
                Module {
                    id: module_id,
                    title: title.clone(),
                    description: None,
                    lessons: vec![Lesson::placeholder(&lesson_id, title)],
                }
            })
            .collect();

        Self {
            id: outline.id.clone(),
            slug: outline.id.clone(),
            title: outline.title.clone(),
            description: outline.description.clone(),
            long_description: outline.description.clone(),
            details: TrackDetails {
                skills: outline.modules.iter().take(4).cloned().collect(),
                overview: "Ce parcours offre une approche structurée et professionnelle. Le contenu détaillé sera disponible prochainement.".to_string(),
                target_audience: vec![
                    "Professionnels".to_string(),
                    "Étudiants".to_string(),
                    "Managers".to_string(),
                ],
                prerequisites: vec!["Aucun prérequis spécifique".to_string()],
                outcomes: vec![
                    "Maîtrise des concepts clés".to_string(),
                    "Application pratique".to_string(),
                    "Vision stratégique".to_string(),
                ],
            },
            modules,
        }
    }
}

impl Lesson {
    /// Lesson shown while the real content is being written
    pub fn placeholder(id: &str, title: &str) -> Self {
        let quiz = (1..=3)
            .map(|n| QuizQuestion {
                id: format!("q{}-{}", n, id),
                question: "Question de démonstration ?".to_string(),
                options: vec![
                    "Option A".to_string(),
                    "Option B".to_string(),
                    "Option C".to_string(),
                ],
                correct_index: 0,
                explanation: "Contenu à venir.".to_string(),
            })
            .collect();

        Self {
            id: id.to_string(),
            slug: id.to_string(),
            title: title.to_string(),
            duration: "10 min".to_string(),
            content: LessonContent {
                paragraphs: vec![
                    "Le contenu de ce module est en cours de développement.".to_string(),
                    "Nous travaillons avec des experts pour vous fournir une formation de haute qualité, adaptée aux réalités du marché.".to_string(),
                    "Revenez bientôt pour accéder à ce cours complet.".to_string(),
                    "En attendant, vous pouvez explorer les parcours Maîtrise SQL, Database Design ou Data Management qui sont déjà disponibles.".to_string(),
                ],
                example_title: "Exemple à venir".to_string(),
                example_content: "Un cas pratique détaillé sera ajouté ici prochainement.".to_string(),
                quiz,
            },
        }
    }
}

/// Outcome of one quiz question
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuestionResult {
    pub id: String,
    pub selected: Option<usize>,
    pub correct_index: usize,
    pub is_correct: bool,
    pub explanation: String,
}

/// Outcome of a submitted quiz
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuizResult {
    pub correct: usize,
    pub total: usize,
    pub questions: Vec<QuestionResult>,
}

impl QuizResult {
    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }
}

impl LessonContent {
    /// Grade answers keyed by question id; unanswered questions count as wrong
    pub fn grade(&self, answers: &HashMap<String, usize>) -> QuizResult {
        let questions: Vec<QuestionResult> = self
            .quiz
            .iter()
            .map(|q| {
                let selected = answers.get(&q.id).copied();
                QuestionResult {
                    id: q.id.clone(),
                    selected,
                    correct_index: q.correct_index,
                    is_correct: selected == Some(q.correct_index),
                    explanation: q.explanation.clone(),
                }
            })
            .collect();

        QuizResult {
            correct: questions.iter().filter(|q| q.is_correct).count(),
            total: questions.len(),
            questions,
        }
    }
}
