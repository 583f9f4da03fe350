use crate::types::{BodyId, Vec3};

/// Per-body force and torque accumulators.
///
/// Contributions are staged as they arrive and folded into the per-body
/// totals by [`ForceContainer::sync`]. Readers see the totals as of the last
/// sync.
#[derive(Debug, Clone, Default)]
pub struct ForceContainer {
    force: Vec<Vec3>,
    torque: Vec<Vec3>,
    staged: Vec<(BodyId, Vec3, Vec3)>,
}

impl ForceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_force(&mut self, id: BodyId, f: Vec3) {
        self.staged.push((id, f, Vec3::zeros()));
    }

    pub fn add_torque(&mut self, id: BodyId, t: Vec3) {
        self.staged.push((id, Vec3::zeros(), t));
    }

    pub fn is_synced(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn sync(&mut self) {
        for (id, f, t) in self.staged.drain(..) {
            if id >= self.force.len() {
                self.force.resize(id + 1, Vec3::zeros());
                self.torque.resize(id + 1, Vec3::zeros());
            }
            self.force[id] += f;
            self.torque[id] += t;
        }
    }

    pub fn force(&self, id: BodyId) -> Vec3 {
        self.force.get(id).copied().unwrap_or_else(Vec3::zeros)
    }

    pub fn torque(&self, id: BodyId) -> Vec3 {
        self.torque.get(id).copied().unwrap_or_else(Vec3::zeros)
    }

    /// Clears totals and staged contributions.
    pub fn reset(&mut self) {
        self.force.iter_mut().for_each(|f| *f = Vec3::zeros());
        self.torque.iter_mut().for_each(|t| *t = Vec3::zeros());
        self.staged.clear();
    }
}
