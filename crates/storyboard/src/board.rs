use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::{
    AspectRatio, GeneratedImage, Locale, ScriptParser, Shot, ShotId, ShotUpdate, StoryboardError,
    StyleTag,
};

/// Ordered list of shots. Every mutation keeps `sequence_number` equal to
/// `index + 1`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Storyboard {
    shots: Vec<Shot>,
    #[serde(default)]
    selected: Option<ShotId>,
    #[serde(default)]
    locale: Locale,
}

/// What the generator needs for one shot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub shot_id: ShotId,
    pub prompt: String,
    pub style: StyleTag,
    pub aspect_ratio: AspectRatio,
}

impl Storyboard {
    pub fn new(locale: Locale) -> Self {
        Self {
            shots: Vec::new(),
            selected: None,
            locale,
        }
    }

    pub fn from_shots(shots: Vec<Shot>, locale: Locale) -> Self {
        let mut board = Self {
            shots,
            selected: None,
            locale,
        };
        board.renumber();
        board
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn shots(&self) -> &[Shot] {
        &self.shots
    }

    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }

    pub fn get(&self, id: ShotId) -> Option<&Shot> {
        self.shots.iter().find(|s| s.id == id)
    }

    pub fn position(&self, id: ShotId) -> Option<usize> {
        self.shots.iter().position(|s| s.id == id)
    }

    fn get_mut(&mut self, id: ShotId) -> Result<&mut Shot, StoryboardError> {
        self.shots
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoryboardError::ShotNotFound(id))
    }

    fn renumber(&mut self) {
        for (idx, shot) in self.shots.iter_mut().enumerate() {
            shot.sequence_number = idx as u32 + 1;
        }
    }

    pub fn selected(&self) -> Option<&Shot> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn select(&mut self, id: Option<ShotId>) -> Result<(), StoryboardError> {
        if let Some(id) = id {
            if self.get(id).is_none() {
                return Err(StoryboardError::ShotNotFound(id));
            }
        }
        self.selected = id;
        Ok(())
    }

    /// Replaces every shot with the parsed script. Blank scripts leave the
    /// board untouched and return `false`.
    pub fn replace_from_script(
        &mut self,
        parser: &ScriptParser,
        script: &str,
        style: StyleTag,
    ) -> bool {
        if script.trim().is_empty() {
            return false;
        }
        let shots = parser.parse(script, style);
        info!(shots = shots.len(), "storyboard replaced from script");
        self.shots = shots;
        self.renumber();
        self.selected = self.shots.first().map(|s| s.id);
        true
    }

    /// Adds a placeholder shot at the end, or right after `after`. The new
    /// shot takes the selected shot's style and becomes the selection.
    pub fn add_shot(&mut self, after: Option<ShotId>) -> Result<ShotId, StoryboardError> {
        let style = self.selected().map(|s| s.style).unwrap_or_default();
        let shot = Shot::placeholder(self.locale, style);
        let index = match after {
            Some(id) => self.position(id).ok_or(StoryboardError::ShotNotFound(id))? + 1,
            None => self.shots.len(),
        };
        let id = self.insert_shot(index, shot)?;
        self.selected = Some(id);
        Ok(id)
    }

    /// Inserts an existing shot at `index` (clamped to the end).
    pub fn insert_shot(&mut self, index: usize, shot: Shot) -> Result<ShotId, StoryboardError> {
        if self.get(shot.id).is_some() {
            return Err(StoryboardError::ShotExists(shot.id));
        }
        let id = shot.id;
        let index = index.min(self.shots.len());
        self.shots.insert(index, shot);
        self.renumber();
        debug!(%id, index, "shot inserted");
        Ok(id)
    }

    /// Removes a shot and returns it with its former index.
    pub fn delete_shot(&mut self, id: ShotId) -> Result<(usize, Shot), StoryboardError> {
        let index = self.position(id).ok_or(StoryboardError::ShotNotFound(id))?;
        let shot = self.shots.remove(index);
        self.renumber();
        if self.selected == Some(id) {
            self.selected = None;
        }
        debug!(%id, index, "shot deleted");
        Ok((index, shot))
    }

    /// Moves the shot at `from` to `to`, as a drag-and-drop would.
    pub fn move_shot(&mut self, from: usize, to: usize) -> Result<(), StoryboardError> {
        let len = self.shots.len();
        if from >= len {
            return Err(StoryboardError::IndexOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(StoryboardError::IndexOutOfRange { index: to, len });
        }
        if from == to {
            return Ok(());
        }
        let shot = self.shots.remove(from);
        self.shots.insert(to, shot);
        self.renumber();
        Ok(())
    }

    /// Applies field edits and returns the update that reverts them.
    pub fn update_shot(
        &mut self,
        id: ShotId,
        update: ShotUpdate,
    ) -> Result<ShotUpdate, StoryboardError> {
        let shot = self.get_mut(id)?;
        Ok(update.apply(shot))
    }

    pub fn apply_style_to_all(&mut self, style: StyleTag) {
        for shot in &mut self.shots {
            shot.style = style;
        }
    }

    /// Non-empty, every shot has an image and nothing is generating.
    pub fn is_ready_to_export(&self) -> bool {
        !self.shots.is_empty()
            && self
                .shots
                .iter()
                .all(|s| s.has_image() && !s.generation_in_flight)
    }

    /// Shots without an image, in storyboard order.
    pub fn pending_generation(&self) -> Vec<ShotId> {
        self.shots
            .iter()
            .filter(|s| !s.has_image())
            .map(|s| s.id)
            .collect()
    }

    /// Marks a shot as generating and returns what to send. `None` when the
    /// shot is gone or a request for it is already outstanding.
    pub fn begin_generation(&mut self, id: ShotId) -> Option<GenerationRequest> {
        let shot = self.shots.iter_mut().find(|s| s.id == id)?;
        if shot.generation_in_flight {
            return None;
        }
        shot.generation_in_flight = true;
        shot.last_error = None;
        Some(GenerationRequest {
            shot_id: id,
            prompt: shot.effective_prompt().to_string(),
            style: shot.style,
            aspect_ratio: shot.aspect_ratio,
        })
    }

    /// Stores a successful result. Returns `false` if the shot was deleted
    /// while its request was outstanding; the image is discarded.
    pub fn complete_generation(&mut self, id: ShotId, image: GeneratedImage) -> bool {
        match self.shots.iter_mut().find(|s| s.id == id) {
            Some(shot) => {
                shot.generated_image = Some(image);
                shot.generation_in_flight = false;
                true
            }
            None => {
                debug!(%id, "discarding image for deleted shot");
                false
            }
        }
    }

    /// Records a failure. Any earlier image stays in place.
    pub fn fail_generation(&mut self, id: ShotId, reason: impl Into<String>) -> bool {
        match self.shots.iter_mut().find(|s| s.id == id) {
            Some(shot) => {
                shot.last_error = Some(reason.into());
                shot.generation_in_flight = false;
                true
            }
            None => false,
        }
    }

    pub fn to_json(&self) -> Result<String, StoryboardError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads a saved storyboard. In-flight flags are reset since no request
    /// survives a reload.
    pub fn from_json(json: &str) -> Result<Self, StoryboardError> {
        let mut board: Storyboard = serde_json::from_str(json)?;
        for shot in &mut board.shots {
            shot.generation_in_flight = false;
        }
        board.renumber();
        if let Some(id) = board.selected {
            if board.get(id).is_none() {
                board.selected = None;
            }
        }
        Ok(board)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoryboardError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, StoryboardError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(board: &Storyboard) -> Vec<u32> {
        board.shots().iter().map(|s| s.sequence_number).collect()
    }

    fn board_of(summaries: &[&str]) -> Storyboard {
        let shots = summaries
            .iter()
            .map(|s| Shot::new(0, *s, *s, StyleTag::Sketch))
            .collect();
        Storyboard::from_shots(shots, Locale::English)
    }

    #[test]
    fn test_from_shots_renumbers() {
        let board = board_of(&["a", "b", "c"]);
        assert_eq!(numbers(&board), vec![1, 2, 3]);
    }

    #[test]
    fn test_move_first_to_last() {
        let mut board = board_of(&["a", "b", "c"]);
        board.move_shot(0, 2).unwrap();
        let order: Vec<_> = board.shots().iter().map(|s| s.summary.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(numbers(&board), vec![1, 2, 3]);
    }

    #[test]
    fn test_move_out_of_range() {
        let mut board = board_of(&["a", "b"]);
        assert!(matches!(
            board.move_shot(0, 2),
            Err(StoryboardError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_add_after_inherits_selected_style() {
        let mut board = board_of(&["a", "b"]);
        let first = board.shots()[0].id;
        board.update_shot(first, ShotUpdate::style(StyleTag::Noir)).unwrap();
        board.select(Some(first)).unwrap();

        let added = board.add_shot(Some(first)).unwrap();
        assert_eq!(board.position(added), Some(1));
        assert_eq!(board.get(added).unwrap().style, StyleTag::Noir);
        assert_eq!(board.get(added).unwrap().summary, "New shot description...");
        assert_eq!(board.selected().map(|s| s.id), Some(added));
        assert_eq!(numbers(&board), vec![1, 2, 3]);
    }

    #[test]
    fn test_add_after_unknown_shot() {
        let mut board = board_of(&["a"]);
        let ghost = ShotId::new();
        assert!(matches!(
            board.add_shot(Some(ghost)),
            Err(StoryboardError::ShotNotFound(id)) if id == ghost
        ));
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_delete_clears_selection() {
        let mut board = board_of(&["a", "b"]);
        let id = board.shots()[1].id;
        board.select(Some(id)).unwrap();
        board.delete_shot(id).unwrap();
        assert!(board.selected().is_none());
    }

    #[test]
    fn test_generation_lifecycle() {
        let mut board = board_of(&["a"]);
        let id = board.shots()[0].id;

        let request = board.begin_generation(id).unwrap();
        assert_eq!(request.prompt, "a");
        assert!(board.get(id).unwrap().generation_in_flight);
        assert!(board.begin_generation(id).is_none(), "second request refused");
        assert!(!board.is_ready_to_export());

        assert!(board.complete_generation(id, GeneratedImage::png(vec![1])));
        assert!(!board.get(id).unwrap().generation_in_flight);
        assert!(board.is_ready_to_export());
    }

    #[test]
    fn test_request_carries_shot_aspect_ratio() {
        let mut board = board_of(&["a"]);
        let id = board.shots()[0].id;
        let portrait = ShotUpdate {
            aspect_ratio: Some(AspectRatio::Portrait),
            ..ShotUpdate::default()
        };
        board.update_shot(id, portrait).unwrap();

        let request = board.begin_generation(id).unwrap();
        assert_eq!(request.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(request.style, StyleTag::Sketch);
    }

    #[test]
    fn test_begin_generation_clears_last_error() {
        let mut board = board_of(&["a"]);
        let id = board.shots()[0].id;
        board.begin_generation(id).unwrap();
        board.fail_generation(id, "boom");
        assert_eq!(board.get(id).unwrap().last_error.as_deref(), Some("boom"));

        board.begin_generation(id).unwrap();
        assert!(board.get(id).unwrap().last_error.is_none());
    }

    #[test]
    fn test_result_for_deleted_shot_is_discarded() {
        let mut board = board_of(&["a", "b"]);
        let id = board.shots()[0].id;
        board.begin_generation(id).unwrap();
        board.delete_shot(id).unwrap();
        assert!(!board.complete_generation(id, GeneratedImage::png(vec![1])));
        assert!(board.shots().iter().all(|s| !s.has_image()));
    }

    #[test]
    fn test_empty_board_is_not_exportable() {
        assert!(!Storyboard::default().is_ready_to_export());
    }
}
