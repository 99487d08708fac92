//! # Stack Extraction
//!
//! The entry point of the decoder. [`StackInspector`] detects the interpreter
//! once, then resolves stacks for any number of threads.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pyscope_core::config::InspectorConfig;
//! use pyscope_core::memory::SnapshotMemory;
//! use pyscope_core::stack::StackInspector;
//! use pyscope_core::target::StaticTarget;
//!
//! # fn main() -> pyscope_core::error::InspectResult<()> {
//! let target = StaticTarget::new(SnapshotMemory::new());
//! let inspector = StackInspector::attach(target, InspectorConfig::default())?;
//! for stack in inspector.resolve_all_threads()? {
//!     println!("Thread {} (thread state {})", stack.thread, stack.thread_state);
//!     for frame in &stack.frames {
//!         println!("  {frame}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::iter::FusedIterator;

use tracing::{debug, info, instrument};

use crate::config::InspectorConfig;
use crate::error::{InspectError, InspectResult};
use crate::frames::FrameWalker;
use crate::interpreter::Interpreter;
use crate::layout::StructKind;
use crate::lines::LineResolver;
use crate::object::ObjectReader;
use crate::target::Target;
use crate::thread_state::{GilState, PythonThread, ThreadStateLocator};
use crate::tls::{TebTls, ThreadLocalLookup};
use crate::types::{Address, LineNumber, ResolvedFrame, ThreadInfo, ThreadStack};
use crate::unicode::UnicodeReader;
use crate::version::{self, PythonModule};

/// Find the Python runtime loaded in `target`.
///
/// ## Errors
///
/// `NoInterpreterFound`, `AmbiguousInterpreter` or `UnsupportedVersion`.
pub fn detect_interpreter<T: Target + ?Sized>(target: &T) -> InspectResult<PythonModule>
{
    version::detect_version(&target.modules()?)
}

/// Resolves Python stacks in one target process.
pub struct StackInspector<T>
{
    target: T,
    interpreter: Interpreter,
    gil_state: GilState,
    tls: Box<dyn ThreadLocalLookup>,
    config: InspectorConfig,
}

impl<T: Target> StackInspector<T>
{
    /// Detect the interpreter in `target` and prepare to read its stacks.
    ///
    /// Version detection failures abort here; nothing useful can be read
    /// without knowing the layout.
    ///
    /// ## Errors
    ///
    /// - `NoInterpreterFound`, `AmbiguousInterpreter`, `UnsupportedVersion`
    /// - `SymbolNotFound` if the GIL-state globals cannot be resolved
    pub fn attach(target: T, config: InspectorConfig) -> InspectResult<Self>
    {
        let module = detect_interpreter(&target)?;
        let interpreter = Interpreter::new(module)?;
        Self::with_interpreter(target, interpreter, config)
    }

    /// Use an already-built [`Interpreter`], for hosts that supply their own
    /// layout catalog.
    ///
    /// ## Errors
    ///
    /// `SymbolNotFound` if the GIL-state globals cannot be resolved.
    pub fn with_interpreter(target: T, interpreter: Interpreter, config: InspectorConfig) -> InspectResult<Self>
    {
        let gil_state = GilState::resolve(&target, interpreter.module())?;
        info!(interpreter = %interpreter.module(), "attached to python runtime");
        Ok(Self {
            target,
            interpreter,
            gil_state,
            tls: Box::new(TebTls::default()),
            config,
        })
    }

    /// Replace the thread-local lookup (64-bit TEB by default).
    #[must_use]
    pub fn with_tls(mut self, tls: impl ThreadLocalLookup + 'static) -> Self
    {
        self.tls = Box::new(tls);
        self
    }

    /// The inspected target.
    pub fn target(&self) -> &T
    {
        &self.target
    }

    /// The detected interpreter.
    pub fn interpreter(&self) -> &Interpreter
    {
        &self.interpreter
    }

    /// Active configuration.
    pub fn config(&self) -> &InspectorConfig
    {
        &self.config
    }

    /// Whether `thread` has an interpreter thread state.
    ///
    /// ## Errors
    ///
    /// Memory and TLS failures.
    pub fn classify(&self, thread: &ThreadInfo) -> InspectResult<PythonThread>
    {
        ThreadStateLocator::new(self.interpreter.catalog(), self.gil_state, self.tls.as_ref())
            .classify(&self.target, thread)
    }

    /// Thread state of `thread`.
    ///
    /// ## Errors
    ///
    /// `NotAttachedThread` for a thread without one.
    pub fn thread_state(&self, thread: &ThreadInfo) -> InspectResult<Address>
    {
        self.classify(thread)?
            .thread_state()
            .ok_or(InspectError::NotAttachedThread(thread.id))
    }

    /// Raw frame addresses of `thread_state`, innermost first.
    pub fn frames(&self, thread_state: Address) -> FrameWalker<'_, T>
    {
        FrameWalker::new(
            &self.target,
            self.interpreter.catalog(),
            thread_state,
            self.config.max_frame_depth,
        )
    }

    /// Resolved frames of `thread_state`, innermost first.
    ///
    /// The sequence is lazy: each frame is read when it is requested, and
    /// calling this again restarts from the innermost frame.
    pub fn resolve_stack(&self, thread_state: Address) -> ResolvedFrames<'_, T>
    {
        ResolvedFrames {
            inspector: self,
            frames: self.frames(thread_state),
        }
    }

    /// Read one frame's filename, function name and line.
    ///
    /// A null code object or a name that is not a string yields the
    /// configured placeholder; a line table problem yields an unknown line.
    ///
    /// ## Errors
    ///
    /// Failures reading the frame, the code object or a string object.
    pub fn resolve_frame(&self, frame: Address) -> InspectResult<ResolvedFrame>
    {
        let catalog = self.interpreter.catalog();
        let code = self
            .target
            .read_pointer_field(frame, catalog.field(StructKind::Frame, "f_code")?)?;
        if code.is_null() {
            debug!(%frame, "frame has no code object");
            return Ok(ResolvedFrame {
                filename: self.config.unknown_placeholder.clone(),
                function: self.config.unknown_placeholder.clone(),
                line: LineNumber::Unknown,
                address: frame,
            });
        }

        let lines = LineResolver::new(&self.target, catalog, self.config.max_line_table_bytes);
        Ok(ResolvedFrame {
            filename: self.code_string(code, "co_filename")?,
            function: self.code_string(code, "co_name")?,
            line: lines.frame_line(frame, code)?,
            address: frame,
        })
    }

    /// Stack of `thread`, or `None` if it is not attached.
    ///
    /// ## Errors
    ///
    /// Lookup, walk and resolution failures.
    #[instrument(skip(self, thread), fields(thread = thread.id.raw()))]
    pub fn resolve_thread(&self, thread: &ThreadInfo) -> InspectResult<Option<ThreadStack>>
    {
        let PythonThread::Attached { thread, thread_state } = self.classify(thread)? else {
            return Ok(None);
        };
        let frames = self.resolve_stack(thread_state).collect::<InspectResult<Vec<_>>>()?;
        debug!(frames = frames.len(), "resolved thread stack");
        Ok(Some(ThreadStack {
            thread,
            thread_state,
            frames,
        }))
    }

    /// Stacks of every attached thread, in the host's thread order.
    ///
    /// ## Errors
    ///
    /// The first failure of any thread.
    pub fn resolve_all_threads(&self) -> InspectResult<Vec<ThreadStack>>
    {
        let mut stacks = Vec::new();
        for thread in self.target.threads()? {
            if let Some(stack) = self.resolve_thread(&thread)? {
                stacks.push(stack);
            }
        }
        Ok(stacks)
    }

    fn code_string(&self, code: Address, field: &str) -> InspectResult<String>
    {
        let catalog = self.interpreter.catalog();
        let string = self
            .target
            .read_pointer_field(code, catalog.field(StructKind::Code, field)?)?;
        if string.is_null() || !ObjectReader::new(&self.target, catalog).is_unicode(string)? {
            debug!(%code, field, "code object name is not a string");
            return Ok(self.config.unknown_placeholder.clone());
        }
        UnicodeReader::new(&self.target, catalog, self.config.max_string_chars).read(string)
    }
}

/// Lazy sequence of resolved frames returned by
/// [`StackInspector::resolve_stack`].
pub struct ResolvedFrames<'a, T>
{
    inspector: &'a StackInspector<T>,
    frames: FrameWalker<'a, T>,
}

impl<T: Target> Iterator for ResolvedFrames<'_, T>
{
    type Item = InspectResult<ResolvedFrame>;

    fn next(&mut self) -> Option<Self::Item>
    {
        let frame = self.frames.next()?;
        Some(frame.and_then(|frame| self.inspector.resolve_frame(frame)))
    }
}

impl<T: Target> FusedIterator for ResolvedFrames<'_, T> {}
