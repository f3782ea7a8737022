use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Shot, ShotId, ShotUpdate, Storyboard, StoryboardError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum StoryboardCommand {
    InsertShot {
        shot: Shot,
        /// Appends when absent.
        #[serde(default)]
        index: Option<usize>,
    },
    RemoveShot {
        shot_id: ShotId,
    },
    MoveShot {
        from: usize,
        to: usize,
    },
    UpdateShot {
        shot_id: ShotId,
        update: ShotUpdate,
    },
}

/// Applies a command and returns the command that undoes it.
pub fn apply_command(
    board: &mut Storyboard,
    command: StoryboardCommand,
) -> Result<StoryboardCommand, StoryboardError> {
    match command {
        StoryboardCommand::InsertShot { shot, index } => {
            let index = index.unwrap_or(board.len());
            let shot_id = board.insert_shot(index, shot)?;
            Ok(StoryboardCommand::RemoveShot { shot_id })
        }
        StoryboardCommand::RemoveShot { shot_id } => {
            let (index, shot) = board.delete_shot(shot_id)?;
            Ok(StoryboardCommand::InsertShot {
                shot,
                index: Some(index),
            })
        }
        StoryboardCommand::MoveShot { from, to } => {
            board.move_shot(from, to)?;
            Ok(StoryboardCommand::MoveShot { from: to, to: from })
        }
        StoryboardCommand::UpdateShot { shot_id, update } => {
            let previous = board.update_shot(shot_id, update)?;
            Ok(StoryboardCommand::UpdateShot {
                shot_id,
                update: previous,
            })
        }
    }
}

/// Undo/redo stacks of inverse commands.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    undo: Vec<StoryboardCommand>,
    #[serde(default)]
    redo: Vec<StoryboardCommand>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(
        &mut self,
        board: &mut Storyboard,
        command: StoryboardCommand,
    ) -> Result<(), StoryboardError> {
        let inverse = apply_command(board, command)?;
        self.undo.push(inverse);
        self.redo.clear();
        Ok(())
    }

    pub fn undo(&mut self, board: &mut Storyboard) -> Result<(), StoryboardError> {
        let command = self.undo.pop().ok_or(StoryboardError::HistoryEmpty("undo"))?;
        let inverse = apply_command(board, command)?;
        self.redo.push(inverse);
        Ok(())
    }

    pub fn redo(&mut self, board: &mut Storyboard) -> Result<(), StoryboardError> {
        let command = self.redo.pop().ok_or(StoryboardError::HistoryEmpty("redo"))?;
        let inverse = apply_command(board, command)?;
        self.undo.push(inverse);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn save(&self, path: &Path) -> Result<(), StoryboardError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// A missing file is an empty history.
    pub fn load(path: &Path) -> Result<Self, StoryboardError> {
        match std::fs::read_to_string(path) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Locale, StyleTag};

    fn board() -> Storyboard {
        let shots = ["a", "b", "c"]
            .iter()
            .map(|s| Shot::new(0, *s, *s, StyleTag::Sketch))
            .collect();
        Storyboard::from_shots(shots, Locale::English)
    }

    fn order(board: &Storyboard) -> Vec<String> {
        board.shots().iter().map(|s| s.summary.clone()).collect()
    }

    #[test]
    fn test_remove_then_undo_restores_position() {
        let mut board = board();
        let mut history = History::new();
        let middle = board.shots()[1].id;

        history
            .execute(&mut board, StoryboardCommand::RemoveShot { shot_id: middle })
            .unwrap();
        assert_eq!(order(&board), vec!["a", "c"]);

        history.undo(&mut board).unwrap();
        assert_eq!(order(&board), vec!["a", "b", "c"]);
        assert_eq!(board.shots()[1].id, middle);
        assert_eq!(board.shots()[1].sequence_number, 2);
    }

    #[test]
    fn test_move_undo_redo() {
        let mut board = board();
        let mut history = History::new();

        history
            .execute(&mut board, StoryboardCommand::MoveShot { from: 0, to: 2 })
            .unwrap();
        assert_eq!(order(&board), vec!["b", "c", "a"]);

        history.undo(&mut board).unwrap();
        assert_eq!(order(&board), vec!["a", "b", "c"]);

        history.redo(&mut board).unwrap();
        assert_eq!(order(&board), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_update_undo() {
        let mut board = board();
        let mut history = History::new();
        let id = board.shots()[0].id;

        history
            .execute(
                &mut board,
                StoryboardCommand::UpdateShot {
                    shot_id: id,
                    update: ShotUpdate::visual_prompt("a wide desert"),
                },
            )
            .unwrap();
        assert_eq!(board.get(id).unwrap().visual_prompt, "a wide desert");

        history.undo(&mut board).unwrap();
        assert_eq!(board.get(id).unwrap().visual_prompt, "a");
    }

    #[test]
    fn test_insert_undo() {
        let mut board = board();
        let mut history = History::new();
        let shot = Shot::placeholder(Locale::English, StyleTag::Realistic);
        let id = shot.id;

        history
            .execute(
                &mut board,
                StoryboardCommand::InsertShot {
                    shot,
                    index: Some(0),
                },
            )
            .unwrap();
        assert_eq!(board.position(id), Some(0));
        assert_eq!(board.shots()[3].sequence_number, 4);

        history.undo(&mut board).unwrap();
        assert!(board.get(id).is_none());
        assert_eq!(board.len(), 3);
    }

    #[test]
    fn test_empty_history() {
        let mut board = board();
        let mut history = History::new();
        assert!(matches!(
            history.undo(&mut board),
            Err(StoryboardError::HistoryEmpty("undo"))
        ));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_failed_command_is_not_recorded() {
        let mut board = board();
        let mut history = History::new();
        let result = history.execute(
            &mut board,
            StoryboardCommand::RemoveShot {
                shot_id: ShotId::new(),
            },
        );
        assert!(result.is_err());
        assert!(!history.can_undo());
    }

    #[test]
    fn test_history_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.history.json");
        let mut board = board();
        let mut history = History::load(&path).unwrap();
        assert!(!history.can_undo());

        history
            .execute(&mut board, StoryboardCommand::MoveShot { from: 2, to: 0 })
            .unwrap();
        history.save(&path).unwrap();

        let mut reloaded = History::load(&path).unwrap();
        reloaded.undo(&mut board).unwrap();
        assert_eq!(order(&board), vec!["a", "b", "c"]);
        assert!(reloaded.can_redo());
    }

    #[test]
    fn test_command_json_shape() {
        let json = serde_json::to_value(StoryboardCommand::MoveShot { from: 1, to: 0 }).unwrap();
        assert_eq!(json["command"], "move_shot");
        assert_eq!(json["from"], 1);
    }
}
