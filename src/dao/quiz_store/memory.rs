use std::{fs, path::Path, sync::Arc};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tracing::info;

use super::{QuizListItem, QuizStore, QuizStoreError, QuizStoreResult, ensure_playable};
use crate::state::quiz::QuizSnapshot;

/// Process-local quiz repository backed by a concurrent map.
#[derive(Clone, Default)]
pub struct InMemoryQuizStore {
    quizzes: Arc<DashMap<String, Arc<QuizSnapshot>>>,
}

impl InMemoryQuizStore {
    /// Build an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload every quiz of a JSON catalog (an array of snapshots).
    ///
    /// Returns the number of quizzes loaded. Unplayable entries abort the load.
    pub fn load_catalog(&self, path: impl AsRef<Path>) -> QuizStoreResult<usize> {
        let path = path.as_ref();
        let catalog_error = |message: String| QuizStoreError::Catalog {
            path: path.display().to_string(),
            message,
        };

        let contents = fs::read_to_string(path).map_err(|err| catalog_error(err.to_string()))?;
        let quizzes: Vec<QuizSnapshot> =
            serde_json::from_str(&contents).map_err(|err| catalog_error(err.to_string()))?;

        for quiz in &quizzes {
            ensure_playable(quiz)?;
        }
        let count = quizzes.len();
        for quiz in quizzes {
            self.quizzes.insert(quiz.id.clone(), Arc::new(quiz));
        }

        info!(path = %path.display(), count, "quiz catalog loaded");
        Ok(count)
    }

    fn insert(&self, quiz: QuizSnapshot) -> QuizStoreResult<()> {
        ensure_playable(&quiz)?;
        self.quizzes.insert(quiz.id.clone(), Arc::new(quiz));
        Ok(())
    }

    fn find(&self, id: &str) -> QuizStoreResult<Arc<QuizSnapshot>> {
        let quiz = self
            .quizzes
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| QuizStoreError::NotFound(id.to_string()))?;
        ensure_playable(&quiz)?;
        Ok(quiz)
    }

    fn list(&self) -> Vec<QuizListItem> {
        let mut items: Vec<QuizListItem> = self
            .quizzes
            .iter()
            .map(|entry| QuizListItem::from(entry.value().as_ref()))
            .collect();
        items.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        items
    }
}

impl QuizStore for InMemoryQuizStore {
    fn get_playable_quiz(&self, id: String) -> BoxFuture<'static, QuizStoreResult<Arc<QuizSnapshot>>> {
        let store = self.clone();
        Box::pin(async move { store.find(&id) })
    }

    fn save_quiz(&self, quiz: QuizSnapshot) -> BoxFuture<'static, QuizStoreResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert(quiz) })
    }

    fn list_quizzes(&self) -> BoxFuture<'static, QuizStoreResult<Vec<QuizListItem>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.list()) })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env, fs,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;
    use crate::state::quiz::{Question, QuestionKind};

    fn quiz(id: &str, title: &str) -> QuizSnapshot {
        QuizSnapshot {
            id: id.into(),
            title: title.into(),
            host_id: "host".into(),
            questions: vec![Question {
                id: "q1".into(),
                text: "?".into(),
                kind: QuestionKind::TrueFalse,
                time_limit_seconds: 5,
                points_multiplier: 1.0,
                options: vec!["true".into(), "false".into()],
                correct_option_index: 1,
            }],
        }
    }

    #[tokio::test]
    async fn saves_and_serves_playable_quizzes() {
        let store = InMemoryQuizStore::new();
        store.save_quiz(quiz("b", "Beta")).await.unwrap();
        store.save_quiz(quiz("a", "Alpha")).await.unwrap();

        let fetched = store.get_playable_quiz("a".into()).await.unwrap();
        assert_eq!(fetched.title, "Alpha");

        let listed = store.list_quizzes().await.unwrap();
        let titles: Vec<_> = listed.iter().map(|item| item.title.as_str()).collect();
        assert_eq!(titles, ["Alpha", "Beta"]);
        assert_eq!(listed[0].question_count, 1);
    }

    #[tokio::test]
    async fn unknown_quiz_is_not_found() {
        let store = InMemoryQuizStore::new();
        assert_eq!(
            store.get_playable_quiz("missing".into()).await.unwrap_err(),
            QuizStoreError::NotFound("missing".into())
        );
    }

    #[tokio::test]
    async fn unplayable_quiz_is_rejected_on_save() {
        let store = InMemoryQuizStore::new();
        let mut broken = quiz("x", "Broken");
        broken.questions.clear();
        assert!(matches!(
            store.save_quiz(broken).await,
            Err(QuizStoreError::NotPlayable(_))
        ));
        assert!(store.list_quizzes().await.unwrap().is_empty());
    }

    #[test]
    fn catalog_file_is_loaded() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = env::temp_dir().join(format!("live-quiz-catalog-{nanos}.json"));
        fs::write(
            &path,
            serde_json::to_string(&vec![quiz("a", "Alpha"), quiz("b", "Beta")]).unwrap(),
        )
        .unwrap();

        let store = InMemoryQuizStore::new();
        assert_eq!(store.load_catalog(&path).unwrap(), 2);
        fs::remove_file(&path).unwrap();

        assert!(matches!(
            store.load_catalog(&path),
            Err(QuizStoreError::Catalog { .. })
        ));
    }
}
