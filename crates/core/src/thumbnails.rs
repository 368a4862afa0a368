//! On-demand thumbnail rendering for the concepts a scenario suggests.

use std::{
    collections::HashMap,
    fmt,
    hash::{DefaultHasher, Hash, Hasher},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use tokio::{fs, task::JoinSet};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, ScenaristError},
    gemini::GenerativeBackend,
    types::ImageData,
};

/// Stable identity of a concept, derived from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConceptId(u64);

impl ConceptId {
    pub fn of(idea: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        idea.trim().hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CardState {
    #[default]
    Idle,
    Loading,
    Ready(ImageData),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: ConceptId,
    pub idea: String,
    pub state: CardState,
}

/// The cards a list of ideas turns into: blanks dropped, repeats merged, order kept.
/// Gallery numbering and card selection both go through this.
pub fn concepts(ideas: &[String]) -> Vec<(ConceptId, String)> {
    let mut concepts: Vec<(ConceptId, String)> = Vec::with_capacity(ideas.len());
    for idea in ideas {
        let idea = idea.trim();
        if idea.is_empty() {
            continue;
        }
        let id = ConceptId::of(idea);
        if concepts.iter().all(|(existing, _)| *existing != id) {
            concepts.push((id, idea.to_string()));
        }
    }
    concepts
}

type States = Arc<Mutex<HashMap<ConceptId, CardState>>>;

pub struct ThumbnailBoard {
    backend: Arc<dyn GenerativeBackend>,
    concepts: Vec<(ConceptId, String)>,
    states: States,
}

impl ThumbnailBoard {
    pub fn new(backend: Arc<dyn GenerativeBackend>, ideas: &[String]) -> Self {
        let mut board = Self {
            backend,
            concepts: Vec::new(),
            states: Arc::new(Mutex::new(HashMap::new())),
        };
        board.set_ideas(ideas);
        board
    }

    /// Replace the concept list. Cards whose text survives keep their state.
    pub fn set_ideas(&mut self, ideas: &[String]) {
        let listed = concepts(ideas);

        let mut states = self.states.lock().expect("ThumbnailBoard poisoned");
        states.retain(|id, _| listed.iter().any(|(kept, _)| kept == id));
        for (id, _) in &listed {
            states.entry(*id).or_default();
        }
        drop(states);

        self.concepts = listed;
    }

    pub fn cards(&self) -> Vec<Card> {
        let states = self.states.lock().expect("ThumbnailBoard poisoned");
        self.concepts
            .iter()
            .map(|(id, idea)| Card {
                id: *id,
                idea: idea.clone(),
                state: states.get(id).cloned().unwrap_or_default(),
            })
            .collect()
    }

    pub fn state(&self, id: ConceptId) -> Option<CardState> {
        self.states
            .lock()
            .expect("ThumbnailBoard poisoned")
            .get(&id)
            .cloned()
    }

    fn idea(&self, id: ConceptId) -> Result<&str> {
        self.concepts
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, idea)| idea.as_str())
            .ok_or_else(|| ScenaristError::UnknownConcept { id: id.to_string() })
    }

    /// Render one card. Calling it again regenerates the image.
    /// Service failures end up in the card state, not in the returned `Err`.
    pub async fn visualize(&self, id: ConceptId) -> Result<CardState> {
        let idea = self.idea(id)?.to_string();
        let (_, state) = render_card(self.backend.clone(), self.states.clone(), id, idea).await;
        Ok(state)
    }

    /// Render several cards at once. Results come back in completion order.
    pub async fn visualize_many(&self, ids: &[ConceptId]) -> Result<Vec<(ConceptId, CardState)>> {
        let mut tasks = JoinSet::new();
        for id in ids {
            let idea = self.idea(*id)?.to_string();
            tasks.spawn(render_card(
                self.backend.clone(),
                self.states.clone(),
                *id,
                idea,
            ));
        }

        let mut rendered = Vec::with_capacity(ids.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(state) => rendered.push(state),
                Err(e) => warn!(error = %e, "Thumbnail task aborted"),
            }
        }
        Ok(rendered)
    }

    /// Write a rendered card to `dir/thumbnail-<id>.<ext>`.
    pub async fn download(&self, id: ConceptId, dir: &Path) -> Result<PathBuf> {
        self.idea(id)?;
        let image = match self.state(id) {
            Some(CardState::Ready(image)) => image,
            _ => return Err(ScenaristError::NotVisualized { id: id.to_string() }),
        };

        let bytes = STANDARD.decode(image.data_base64.as_bytes())?;
        fs::create_dir_all(dir).await?;
        let path = dir.join(format!("thumbnail-{}.{}", id, image.extension()));
        fs::write(&path, bytes).await?;

        info!(path = %path.display(), "Thumbnail saved");
        Ok(path)
    }
}

async fn render_card(
    backend: Arc<dyn GenerativeBackend>,
    states: States,
    id: ConceptId,
    idea: String,
) -> (ConceptId, CardState) {
    set_state(&states, id, CardState::Loading);
    debug!(%id, "Rendering thumbnail");

    let state = match backend.generate_thumbnail(&idea).await {
        Ok(image) => CardState::Ready(image),
        Err(e) => {
            warn!(%id, error = %e, "Thumbnail generation failed");
            CardState::Failed(e.to_string())
        }
    };

    set_state(&states, id, state.clone());
    (id, state)
}

fn set_state(states: &States, id: ConceptId, state: CardState) {
    let mut states = states.lock().expect("ThumbnailBoard poisoned");
    // The concept may have been dropped while the request was in flight.
    if let Some(slot) = states.get_mut(&id) {
        *slot = state;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::types::{ChatTurn, GenerateRequest, GenerateResult};

    #[derive(Default)]
    struct FakeImages {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerativeBackend for FakeImages {
        async fn generate_scenario(&self, _request: &GenerateRequest) -> Result<GenerateResult> {
            Ok(GenerateResult::default())
        }

        async fn generate_thumbnail(&self, idea: &str) -> Result<ImageData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if idea.contains("fail") {
                return Err(ScenaristError::NoImage);
            }
            Ok(ImageData {
                mime_type: "image/png".to_string(),
                data_base64: STANDARD.encode(idea.as_bytes()),
            })
        }

        async fn chat(&self, _system: &str, _history: &[ChatTurn]) -> Result<String> {
            Ok(String::new())
        }
    }

    fn ideas(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn concept_ids_follow_text() {
        assert_eq!(ConceptId::of("Red car"), ConceptId::of(" Red car "));
        assert_ne!(ConceptId::of("Red car"), ConceptId::of("Blue car"));
        assert_eq!(ConceptId::of("Red car").to_string().len(), 16);
    }

    #[tokio::test]
    async fn cards_start_idle_and_render_on_demand() {
        let backend = Arc::new(FakeImages::default());
        let board = ThumbnailBoard::new(backend.clone(), &ideas(&["Red car", "", "Red car"]));

        let cards = board.cards();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].state, CardState::Idle);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

        let state = board.visualize(cards[0].id).await.unwrap();
        assert!(matches!(state, CardState::Ready(ref image) if image.mime_type == "image/png"));

        board.visualize(cards[0].id).await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn gallery_numbering_matches_cards() {
        let list = ideas(&["A", "A", " ", "B"]);
        let listed = concepts(&list);
        assert_eq!(
            listed.iter().map(|(_, idea)| idea.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );

        let board = ThumbnailBoard::new(Arc::new(FakeImages::default()), &list);
        let cards = board.cards();
        assert_eq!(cards.len(), listed.len());
        for (card, (id, idea)) in cards.iter().zip(&listed) {
            assert_eq!(card.id, *id);
            assert_eq!(&card.idea, idea);
        }
    }

    #[tokio::test]
    async fn visualize_returns_the_card_state() {
        let board = ThumbnailBoard::new(
            Arc::new(FakeImages::default()),
            &ideas(&["Alpha", "fail me"]),
        );

        let ready = board.visualize(ConceptId::of("Alpha")).await.unwrap();
        assert_eq!(board.state(ConceptId::of("Alpha")), Some(ready.clone()));
        assert!(matches!(ready, CardState::Ready(_)));

        let failed = board.visualize(ConceptId::of("fail me")).await.unwrap();
        assert!(matches!(failed, CardState::Failed(_)));
    }

    #[tokio::test]
    async fn reordering_keeps_state_with_its_concept() {
        let backend = Arc::new(FakeImages::default());
        let mut board = ThumbnailBoard::new(backend, &ideas(&["Alpha", "Beta"]));
        let alpha = ConceptId::of("Alpha");
        board.visualize(alpha).await.unwrap();

        board.set_ideas(&ideas(&["Gamma", "Beta", "Alpha"]));
        let cards = board.cards();

        assert_eq!(cards[0].state, CardState::Idle);
        assert_eq!(cards[1].state, CardState::Idle);
        assert_eq!(cards[2].id, alpha);
        assert!(matches!(cards[2].state, CardState::Ready(_)));
    }

    #[tokio::test]
    async fn failures_are_per_card() {
        let backend = Arc::new(FakeImages::default());
        let board = ThumbnailBoard::new(backend, &ideas(&["works", "will fail", "also works"]));
        let ids: Vec<ConceptId> = board.cards().iter().map(|c| c.id).collect();

        let rendered = board.visualize_many(&ids).await.unwrap();

        assert_eq!(rendered.len(), 3);
        let failed = ConceptId::of("will fail");
        for (id, state) in rendered {
            if id == failed {
                assert!(matches!(state, CardState::Failed(ref m) if m.contains("No image")));
            } else {
                assert!(matches!(state, CardState::Ready(_)));
            }
        }
    }

    #[tokio::test]
    async fn unknown_concepts_are_rejected() {
        let board = ThumbnailBoard::new(Arc::new(FakeImages::default()), &ideas(&["Alpha"]));
        let err = board.visualize(ConceptId::of("Omega")).await.unwrap_err();
        assert!(matches!(err, ScenaristError::UnknownConcept { .. }));
    }

    #[tokio::test]
    async fn download_writes_decoded_image() {
        let dir = tempfile::tempdir().unwrap();
        let board = ThumbnailBoard::new(Arc::new(FakeImages::default()), &ideas(&["Alpha"]));
        let id = ConceptId::of("Alpha");

        let err = board.download(id, dir.path()).await.unwrap_err();
        assert!(matches!(err, ScenaristError::NotVisualized { .. }));

        board.visualize(id).await.unwrap();
        let path = board.download(id, &dir.path().join("out")).await.unwrap();

        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("thumbnail-{}.png", id)
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"Alpha");
    }
}
