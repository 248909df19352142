// SPDX: CC0-1.0

//! A [`Graph`] fed by noisy input: keystrokes, range edits and pointer
//! drags are held back until they settle, then applied once.

use crate::{
    config::DebounceConfig,
    graph::{FunctionId, Graph, GraphError},
    schedule::Coalescer,
    viewport::Viewport,
};
use log::trace;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditKey {
    Expression(FunctionId),
    Range,
    Pan,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Edit {
    Expression(FunctionId, String),
    Viewport(Viewport),
}

#[derive(Debug)]
pub struct Session {
    graph: Graph,
    pending: Coalescer<EditKey, Edit>,
    delays: DebounceConfig,
}

impl Session {
    pub fn new(graph: Graph, delays: DebounceConfig) -> Self {
        Self {
            graph,
            pending: Coalescer::new(),
            delays,
        }
    }

    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Direct access for edits that apply immediately.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// The viewport the user is steering towards: the newest pending pan or
    /// range edit, or the applied one.
    pub fn target_viewport(&self) -> Viewport {
        for key in [EditKey::Pan, EditKey::Range] {
            if let Some(Edit::Viewport(vp)) = self.pending.peek(&key) {
                return *vp;
            }
        }
        *self.graph.viewport()
    }

    pub fn type_expression(&mut self, id: FunctionId, text: &str, now: Instant) {
        let edit = Edit::Expression(id, text.to_string());
        self.defer(EditKey::Expression(id), self.delays.typing(), edit, now);
    }

    /// A typed range. Supersedes any drag still pending.
    pub fn edit_range(&mut self, viewport: Viewport, now: Instant) {
        self.supersede(EditKey::Pan);
        self.defer(EditKey::Range, self.delays.range(), Edit::Viewport(viewport), now);
    }

    /// One step of a pointer drag. Supersedes any range edit still pending.
    pub fn drag(&mut self, viewport: Viewport, now: Instant) {
        self.supersede(EditKey::Range);
        self.defer(EditKey::Pan, self.delays.pan(), Edit::Viewport(viewport), now);
    }

    /// Pointer released: the final drag position applies right away.
    pub fn release(&mut self) -> Result<(), GraphError> {
        match self.pending.flush(&EditKey::Pan) {
            Some(edit) => self.apply(edit),
            None => Ok(()),
        }
    }

    /// Applies every edit that has been quiet long enough.
    pub fn tick(&mut self, now: Instant) -> Vec<GraphError> {
        let due = self.pending.poll(now);
        self.apply_all(due)
    }

    /// Applies everything pending regardless of timing.
    pub fn settle(&mut self) -> Vec<GraphError> {
        let all = self.pending.flush_all();
        self.apply_all(all)
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.pending.next_due()
    }

    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }

    fn defer(&mut self, key: EditKey, delay: std::time::Duration, edit: Edit, now: Instant) {
        if self.pending.schedule(key, delay, edit, now).is_some() {
            trace!("coalesced {key:?}");
        }
    }

    // only the newest viewport edit may stay pending
    fn supersede(&mut self, key: EditKey) {
        if self.pending.flush(&key).is_some() {
            trace!("{key:?} superseded");
        }
    }

    fn apply_all(&mut self, edits: Vec<(EditKey, Edit)>) -> Vec<GraphError> {
        edits
            .into_iter()
            .filter_map(|(_, edit)| self.apply(edit).err())
            .collect()
    }

    fn apply(&mut self, edit: Edit) -> Result<(), GraphError> {
        match edit {
            Edit::Expression(id, text) => self.graph.set_expression(id, &text),
            Edit::Viewport(viewport) => {
                self.graph.set_viewport(viewport);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pipeline::SamplingSettings, PlotMode};
    use std::time::Duration;

    const MS: Duration = Duration::from_millis(1);

    fn session() -> (Session, FunctionId) {
        let mut graph = Graph::new(
            Viewport::default(),
            PlotMode::Rectangular,
            SamplingSettings::default(),
        );
        let id = graph.add();
        (Session::new(graph, DebounceConfig::default()), id)
    }

    #[test]
    fn typing_applies_only_the_final_text() {
        let (mut s, id) = session();
        let t0 = Instant::now();
        for (i, text) in ["s", "si", "sin(", "sin(x"].iter().enumerate() {
            s.type_expression(id, text, t0 + 50 * i as u32 * MS);
        }
        assert!(s.tick(t0 + 300 * MS).is_empty());
        assert_eq!(s.graph().function(id).unwrap().expression, "");

        // the unfinished text is applied and rejected
        let errors = s.tick(t0 + 450 * MS);
        assert_eq!(errors.len(), 1);
        assert_eq!(s.graph().function(id).unwrap().expression, "sin(x");

        s.type_expression(id, "sin(x)", t0 + 500 * MS);
        assert!(s.settle().is_empty());
        assert!(!s.graph().function(id).unwrap().points.is_empty());
        assert!(s.is_settled());
    }

    #[test]
    fn release_flushes_the_drag() {
        let (mut s, _) = session();
        let t0 = Instant::now();
        let start = *s.graph().viewport();
        for i in 0..5 {
            let next = s.target_viewport().pan(10.0, 0.0).unwrap();
            s.drag(next, t0 + i * 16 * MS);
        }
        assert_eq!(*s.graph().viewport(), start);
        s.release().unwrap();
        assert!(s.is_settled());
        // five drags of 10 px at 40 px per unit
        assert!((s.graph().viewport().min_x() - (start.min_x() - 1.25)).abs() < 1e-9);
    }

    #[test]
    fn latest_viewport_edit_wins() {
        let (mut s, _) = session();
        let t0 = Instant::now();
        let range = s.graph().viewport().with_range(0.0..10.0, 0.0..7.5).unwrap();
        s.edit_range(range, t0);
        // 80 px per unit after the range edit
        let dragged = s.target_viewport().pan(40.0, 0.0).unwrap();
        s.drag(dragged, t0 + 10 * MS);
        assert_eq!(s.target_viewport(), dragged);
        assert!(s.tick(t0 + 1000 * MS).is_empty());
        assert_eq!(*s.graph().viewport(), dragged);
        assert!((s.graph().viewport().min_x() + 0.5).abs() < 1e-9);

        // and a typed range after a drag replaces it
        s.drag(dragged.pan(40.0, 0.0).unwrap(), t0 + 1100 * MS);
        s.edit_range(range, t0 + 1110 * MS);
        s.settle();
        assert_eq!(*s.graph().viewport(), range);
    }

    #[test]
    fn range_edits_wait_longer_than_drags() {
        let (mut s, _) = session();
        let t0 = Instant::now();
        let range = s.graph().viewport().with_range(0.0..1.0, 0.0..1.0).unwrap();
        s.edit_range(range, t0);
        assert_eq!(s.next_due(), Some(t0 + 400 * MS));
        assert!(s.tick(t0 + 399 * MS).is_empty());
        assert_ne!(*s.graph().viewport(), range);
        s.tick(t0 + 400 * MS);
        assert_eq!(*s.graph().viewport(), range);
    }
}
