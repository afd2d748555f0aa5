use std::sync::Arc;

use crate::instance::Instance;

/// Depth of the fixed traversal stacks. Tree builders cap their depth at
/// the same bound, so a traversal can never overflow.
pub const MAX_STACK_SIZE: usize = 64;

/// One suspended subtree during a stack-machine traversal.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackFrame {
    pub node: u32,
    pub near: f32,
    pub far: f32,
}

/// Per-ray-type counters, kept for statistics only.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayCounters {
    pub eye_rays: u64,
    pub shadow_rays: u64,
    pub reflection_rays: u64,
    pub glossy_rays: u64,
    pub refraction_rays: u64,
    pub rays: u64,
}

/// Scratch state for one in-flight ray query.
///
/// Exactly one of these is owned by each worker for its entire lifetime and
/// reused across many rays; it is never shared between threads. The hit
/// fields (`instance`, `prim_id`, `u`/`v`/`w`) are only meaningful while
/// [`IntersectionState::hit`] returns true and are overwritten by the next
/// query.
///
/// Two traversal stacks are kept: level 0 serves the top-level search over
/// instances, level 1 the search inside the current instance's geometry.
/// A traversal latches its level once on entry (see
/// [`IntersectionState::stack_level`]), so a geometry-local traversal
/// nested inside the top-level one cannot clobber its caller's frames.
pub struct IntersectionState {
    /// Time of this ray tree, constant between the camera's shutter open
    /// and close times.
    pub time: f32,
    pub u: f32,
    pub v: f32,
    pub w: f32,
    /// The instance recorded by the closest hit so far, if any.
    pub instance: Option<Arc<Instance>>,
    /// Primitive id of the closest hit, local to `instance`.
    pub prim_id: usize,
    /// The instance whose geometry is currently being searched.
    pub(crate) current: Option<Arc<Instance>>,
    pub counters: RayCounters,
    stacks: Box<[[StackFrame; MAX_STACK_SIZE]; 2]>,
}

impl IntersectionState {
    pub fn new() -> Self {
        Self {
            time: 0.0,
            u: 0.0,
            v: 0.0,
            w: 0.0,
            instance: None,
            prim_id: 0,
            current: None,
            counters: RayCounters::default(),
            stacks: Box::new([[StackFrame::default(); MAX_STACK_SIZE]; 2]),
        }
    }

    /// Checks whether a hit has been recorded.
    #[inline]
    pub fn hit(&self) -> bool {
        self.instance.is_some()
    }

    /// Stack level for the traversal that is about to start: 0 for the
    /// top-level instance search, 1 once a current instance is set. Latch
    /// the result once per traversal.
    #[inline]
    pub fn stack_level(&self) -> usize {
        usize::from(self.current.is_some())
    }

    #[inline]
    pub fn stack_store(&mut self, level: usize, slot: usize, frame: StackFrame) {
        debug_assert!(slot < MAX_STACK_SIZE, "traversal stack overflow");
        self.stacks[level][slot] = frame;
    }

    #[inline]
    pub fn stack_load(&self, level: usize, slot: usize) -> StackFrame {
        self.stacks[level][slot]
    }

    /// Record an intersection with the given primitive id; the owning
    /// instance is the current one.
    #[inline]
    pub fn set_intersection(&mut self, prim_id: usize) {
        self.instance = self.current.clone();
        self.prim_id = prim_id;
    }

    /// Record an intersection with surface parameters pinpointing the
    /// location on the primitive.
    #[inline]
    pub fn set_intersection_uv(&mut self, prim_id: usize, u: f32, v: f32) {
        self.set_intersection(prim_id);
        self.u = u;
        self.v = v;
    }

    #[inline]
    pub fn set_intersection_uvw(&mut self, prim_id: usize, u: f32, v: f32, w: f32) {
        self.set_intersection_uv(prim_id, u, v);
        self.w = w;
    }
}

impl Default for IntersectionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state_has_no_hit() {
        let state = IntersectionState::new();
        assert!(!state.hit());
        assert_eq!(state.stack_level(), 0);
    }

    #[test]
    fn test_stack_store_load() {
        let mut state = IntersectionState::new();
        for level in 0..2 {
            for slot in 0..MAX_STACK_SIZE {
                state.stack_store(
                    level,
                    slot,
                    StackFrame {
                        node: (level * 100 + slot) as u32,
                        near: slot as f32,
                        far: slot as f32 + 1.0,
                    },
                );
            }
        }
        let f = state.stack_load(1, 63);
        assert_eq!(f.node, 163);
        assert_eq!(f.near, 63.0);
        let f = state.stack_load(0, 0);
        assert_eq!(f.node, 0);
    }
}
