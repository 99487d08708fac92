//! # Frame Walker
//!
//! Lazily follows a thread's frame chain from the innermost frame outward.
//!
//! | Family       | Head                                  | Link       |
//! |--------------|---------------------------------------|------------|
//! | ≤ 3.10       | `tstate->frame`                       | `f_back`   |
//! | 3.11         | `tstate->cframe->current_frame`       | `previous` |
//!
//! Nothing in the target guarantees the chain terminates, so the walker stops
//! with `FrameChainTooLong` after a configurable number of frames and with
//! `SuspectedCycle` when a frame address comes around a second time. After
//! yielding an error the walker is exhausted.

use std::collections::HashSet;
use std::iter::FusedIterator;

use tracing::{debug, warn};

use crate::error::{InspectError, InspectResult};
use crate::layout::{LayoutCatalog, StructKind};
use crate::memory::MemoryAccess;
use crate::types::Address;
use crate::version::VersionFamily;

#[derive(Debug, Clone, Copy)]
enum Step
{
    Head(Address),
    Link(Address),
}

/// Iterator over the frame addresses of one thread state.
pub struct FrameWalker<'a, M>
{
    memory: &'a M,
    catalog: &'a LayoutCatalog,
    step: Option<Step>,
    visited: HashSet<Address>,
    max_depth: usize,
}

impl<'a, M: MemoryAccess> FrameWalker<'a, M>
{
    /// Walk the frames of `thread_state`, yielding at most `max_depth`.
    ///
    /// No memory is read until the first call to `next`.
    pub fn new(memory: &'a M, catalog: &'a LayoutCatalog, thread_state: Address, max_depth: usize) -> Self
    {
        Self {
            memory,
            catalog,
            step: Some(Step::Head(thread_state)),
            visited: HashSet::new(),
            max_depth,
        }
    }

    /// Number of frames yielded so far.
    pub fn depth(&self) -> usize
    {
        self.visited.len()
    }

    /// Innermost frame of `thread_state`, or null.
    fn head(&self, thread_state: Address) -> InspectResult<Address>
    {
        match self.catalog.family() {
            VersionFamily::Legacy | VersionFamily::V310 => self
                .memory
                .read_pointer_field(thread_state, self.catalog.field(StructKind::ThreadState, "frame")?),
            VersionFamily::V311Plus => {
                let cframe = self
                    .memory
                    .read_pointer_field(thread_state, self.catalog.field(StructKind::ThreadState, "cframe")?)?;
                if cframe.is_null() {
                    return Ok(Address::ZERO);
                }
                self.memory
                    .read_pointer_field(cframe, self.catalog.field(StructKind::CFrame, "current_frame")?)
            }
        }
    }

    /// Caller of `frame`, or null.
    fn previous(&self, frame: Address) -> InspectResult<Address>
    {
        let link = match self.catalog.family() {
            VersionFamily::Legacy | VersionFamily::V310 => "f_back",
            VersionFamily::V311Plus => "previous",
        };
        self.memory
            .read_pointer_field(frame, self.catalog.field(StructKind::Frame, link)?)
    }
}

impl<M: MemoryAccess> Iterator for FrameWalker<'_, M>
{
    type Item = InspectResult<Address>;

    fn next(&mut self) -> Option<Self::Item>
    {
        let step = self.step.take()?;
        let frame = match step {
            Step::Head(thread_state) => self.head(thread_state),
            Step::Link(frame) => self.previous(frame),
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => return Some(Err(err)),
        };

        if frame.is_null() {
            debug!(depth = self.depth(), "end of frame chain");
            return None;
        }
        if self.depth() >= self.max_depth {
            warn!(limit = self.max_depth, %frame, "frame chain cut by depth limit");
            return Some(Err(InspectError::FrameChainTooLong { limit: self.max_depth }));
        }
        if !self.visited.insert(frame) {
            warn!(%frame, depth = self.depth(), "frame chain revisits a frame");
            return Some(Err(InspectError::SuspectedCycle { address: frame }));
        }

        self.step = Some(Step::Link(frame));
        Some(Ok(frame))
    }
}

impl<M: MemoryAccess> FusedIterator for FrameWalker<'_, M> {}
