use std::sync::Arc;

use model::{Drawing, Edit, Stroke};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    Apply,
    Undo,
    Redo,
    Replace,
}

/// What one document mutation did. `affected_strokes` are the strokes whose
/// pixels appeared or disappeared, used to derive dirty regions.
#[derive(Debug, Clone)]
pub struct DocumentChange {
    pub revision: u64,
    pub cause: ChangeCause,
    pub affected_strokes: Vec<Arc<Stroke>>,
}

/// Live drawing plus linear undo/redo history.
///
/// Both stacks hold edits in the form needed to re-apply them: `Clear`
/// carries the stroke list that was live when it was applied, so undoing it
/// restores exactly that list. An edit is on at most one of the stacks.
#[derive(Debug, Default)]
pub struct Document {
    drawing: Drawing,
    undo_stack: Vec<Edit>,
    redo_stack: Vec<Edit>,
    revision: u64,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drawing(drawing: Drawing) -> Self {
        Self {
            drawing,
            ..Self::default()
        }
    }

    pub fn drawing(&self) -> &Drawing {
        &self.drawing
    }

    /// Cheap copy of the live drawing; strokes are shared.
    pub fn snapshot(&self) -> Drawing {
        self.drawing.clone()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Applies a new edit. Any redo tail is discarded.
    pub fn apply(&mut self, edit: Edit) -> DocumentChange {
        if !self.redo_stack.is_empty() {
            tracing::debug!(
                discarded = self.redo_stack.len(),
                "new edit discards redo history"
            );
            self.redo_stack.clear();
        }
        let (recorded, affected_strokes) = self.perform(edit);
        self.undo_stack.push(recorded);
        self.change(ChangeCause::Apply, affected_strokes)
    }

    pub fn add_stroke(&mut self, stroke: Stroke) -> DocumentChange {
        self.apply(Edit::add_stroke(stroke))
    }

    pub fn clear(&mut self) -> DocumentChange {
        self.apply(Edit::clear())
    }

    pub fn undo(&mut self) -> Option<DocumentChange> {
        let edit = self.undo_stack.pop()?;
        let affected_strokes = match &edit {
            Edit::AddStroke(stroke) => {
                let removed = self.drawing.pop_stroke();
                debug_assert!(
                    removed
                        .as_ref()
                        .is_some_and(|removed| Arc::ptr_eq(removed, stroke)),
                    "undo of AddStroke must remove the stroke it added"
                );
                removed.into_iter().collect()
            }
            Edit::Clear { previous } => {
                let mut affected = self.drawing.take_strokes();
                self.drawing.replace_strokes(previous.clone());
                affected.extend(previous.iter().cloned());
                affected
            }
        };
        self.redo_stack.push(edit);
        Some(self.change(ChangeCause::Undo, affected_strokes))
    }

    pub fn redo(&mut self) -> Option<DocumentChange> {
        let edit = self.redo_stack.pop()?;
        let (recorded, affected_strokes) = self.perform(edit);
        self.undo_stack.push(recorded);
        Some(self.change(ChangeCause::Redo, affected_strokes))
    }

    /// Installs a loaded drawing and forgets all history.
    pub fn replace_drawing(&mut self, drawing: Drawing) -> DocumentChange {
        let mut affected_strokes = self.drawing.take_strokes();
        affected_strokes.extend(drawing.strokes().iter().cloned());
        self.drawing = drawing;
        self.undo_stack.clear();
        self.redo_stack.clear();
        tracing::info!(strokes = self.drawing.len(), "document drawing replaced");
        self.change(ChangeCause::Replace, affected_strokes)
    }

    fn perform(&mut self, edit: Edit) -> (Edit, Vec<Arc<Stroke>>) {
        match edit {
            Edit::AddStroke(stroke) => {
                self.drawing.push_stroke(Arc::clone(&stroke));
                let affected = vec![Arc::clone(&stroke)];
                (Edit::AddStroke(stroke), affected)
            }
            Edit::Clear { .. } => {
                let previous = self.drawing.take_strokes();
                let affected = previous.clone();
                (Edit::Clear { previous }, affected)
            }
        }
    }

    fn change(&mut self, cause: ChangeCause, affected_strokes: Vec<Arc<Stroke>>) -> DocumentChange {
        self.revision = self
            .revision
            .checked_add(1)
            .expect("document revision overflow");
        DocumentChange {
            revision: self.revision,
            cause,
            affected_strokes,
        }
    }
}
