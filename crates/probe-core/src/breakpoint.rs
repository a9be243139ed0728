//! User breakpoints and their registry.
//!
//! Breakpoints carry two identities. The `index` is the stable, user-facing
//! handle: assigned once at creation, never reused, and it outlives adapter
//! sessions. The adapter `id` is volatile, assigned by the adapter in
//! `setBreakpoints` responses and used only to match incoming breakpoint
//! events. The two must never be conflated.

use std::collections::BTreeMap;

use crate::error::DebuggerError;

/// Enablement state of a breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointState {
    /// Active.
    Enabled,
    /// Kept in the registry but not sent to the adapter.
    Disabled,
    /// Active until first hit, then auto-disabled.
    Once,
}

impl BreakpointState {
    /// Whether a breakpoint in this state is sent to the adapter.
    pub fn is_active(self) -> bool {
        !matches!(self, BreakpointState::Disabled)
    }
}

/// Where a breakpoint lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointKind {
    /// A source location.
    Source {
        /// Filesystem path of the source.
        path: String,
        /// 1-based line.
        line: i64,
    },
    /// A function entry. The adapter may resolve it to a source location.
    Function {
        /// Name of the function.
        name: String,
        /// Adapter-resolved path, when known.
        path: Option<String>,
        /// Adapter-resolved line, when known.
        line: Option<i64>,
    },
}

/// One user breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    index: u32,
    adapter_id: Option<i64>,
    kind: BreakpointKind,
    state: BreakpointState,
    verified: bool,
    message: Option<String>,
}

impl Breakpoint {
    /// The stable user-facing handle.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The adapter-assigned id, if a response has carried one.
    pub fn adapter_id(&self) -> Option<i64> {
        self.adapter_id
    }

    /// Source or function kind.
    pub fn kind(&self) -> &BreakpointKind {
        &self.kind
    }

    /// Current enablement state.
    pub fn state(&self) -> BreakpointState {
        self.state
    }

    /// Whether the adapter verified the breakpoint.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Last adapter-supplied message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The source location, for source breakpoints and resolved function
    /// breakpoints.
    pub fn location(&self) -> Option<(&str, i64)> {
        match &self.kind {
            BreakpointKind::Source { path, line } => Some((path, *line)),
            BreakpointKind::Function { path, line, .. } => {
                path.as_deref().zip(*line)
            }
        }
    }
}

/// The registry of all user breakpoints.
#[derive(Debug, Default)]
pub struct BreakpointCollection {
    breakpoints: BTreeMap<u32, Breakpoint>,
    next_index: u32,
    once_supported: bool,
}

impl BreakpointCollection {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether one-shot breakpoints may be created.
    pub fn supports_once_state(&self) -> bool {
        self.once_supported
    }

    /// Allow one-shot breakpoints (the adapter reports breakpoint ids on
    /// stop events, so hits can be attributed).
    pub fn enable_once_state(&mut self) {
        self.once_supported = true;
    }

    /// Disallow one-shot breakpoints, demoting existing ones to plain
    /// enabled so they do not linger in an unattributable state.
    pub fn disable_once_state(&mut self) {
        self.once_supported = false;
        for bp in self.breakpoints.values_mut() {
            if bp.state == BreakpointState::Once {
                bp.state = BreakpointState::Enabled;
            }
        }
    }

    fn initial_state(&self, once: bool) -> Result<BreakpointState, DebuggerError> {
        if once {
            if !self.once_supported {
                return Err(DebuggerError::UnsupportedCapability(
                    "one-shot breakpoints",
                ));
            }
            Ok(BreakpointState::Once)
        } else {
            Ok(BreakpointState::Enabled)
        }
    }

    fn insert(&mut self, kind: BreakpointKind, once: bool) -> Result<u32, DebuggerError> {
        let state = self.initial_state(once)?;
        let index = self.next_index;
        self.next_index += 1;
        self.breakpoints.insert(
            index,
            Breakpoint {
                index,
                adapter_id: None,
                kind,
                state,
                verified: false,
                message: None,
            },
        );
        Ok(index)
    }

    /// Add a source breakpoint, returning its index.
    pub fn add_source_breakpoint(
        &mut self,
        path: impl Into<String>,
        line: i64,
        once: bool,
    ) -> Result<u32, DebuggerError> {
        self.insert(
            BreakpointKind::Source {
                path: path.into(),
                line,
            },
            once,
        )
    }

    /// Add a function breakpoint, returning its index.
    pub fn add_function_breakpoint(
        &mut self,
        name: impl Into<String>,
        once: bool,
    ) -> Result<u32, DebuggerError> {
        self.insert(
            BreakpointKind::Function {
                name: name.into(),
                path: None,
                line: None,
            },
            once,
        )
    }

    /// Delete one breakpoint. The index is never reassigned.
    pub fn delete_breakpoint(&mut self, index: u32) -> Result<Breakpoint, DebuggerError> {
        self.breakpoints
            .remove(&index)
            .ok_or_else(|| DebuggerError::not_found(format!("breakpoint {index}")))
    }

    /// Delete every breakpoint.
    pub fn delete_all_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// Look up a breakpoint by index.
    pub fn get_breakpoint_by_index(&self, index: u32) -> Result<&Breakpoint, DebuggerError> {
        self.breakpoints
            .get(&index)
            .ok_or_else(|| DebuggerError::not_found(format!("breakpoint {index}")))
    }

    /// Look up a breakpoint by its adapter id.
    pub fn get_breakpoint_by_id(&self, adapter_id: i64) -> Result<&Breakpoint, DebuggerError> {
        self.breakpoints
            .values()
            .find(|bp| bp.adapter_id == Some(adapter_id))
            .ok_or_else(|| {
                DebuggerError::not_found(format!("breakpoint with adapter id {adapter_id}"))
            })
    }

    fn get_mut(&mut self, index: u32) -> Result<&mut Breakpoint, DebuggerError> {
        self.breakpoints
            .get_mut(&index)
            .ok_or_else(|| DebuggerError::not_found(format!("breakpoint {index}")))
    }

    /// Record the adapter id from a reconciliation response.
    pub fn set_breakpoint_id(
        &mut self,
        index: u32,
        adapter_id: Option<i64>,
    ) -> Result<(), DebuggerError> {
        self.get_mut(index)?.adapter_id = adapter_id;
        Ok(())
    }

    /// Record the adapter's verification flag.
    pub fn set_breakpoint_verified(
        &mut self,
        index: u32,
        verified: bool,
    ) -> Result<(), DebuggerError> {
        self.get_mut(index)?.verified = verified;
        Ok(())
    }

    /// Record the adapter's message.
    pub fn set_breakpoint_message(
        &mut self,
        index: u32,
        message: Option<String>,
    ) -> Result<(), DebuggerError> {
        self.get_mut(index)?.message = message;
        Ok(())
    }

    /// Record the source location an adapter resolved a function
    /// breakpoint to. Rejects source breakpoints.
    pub fn set_path_and_line(
        &mut self,
        index: u32,
        path: impl Into<String>,
        line: i64,
    ) -> Result<(), DebuggerError> {
        let bp = self.get_mut(index)?;
        match &mut bp.kind {
            BreakpointKind::Function {
                path: resolved_path,
                line: resolved_line,
                ..
            } => {
                *resolved_path = Some(path.into());
                *resolved_line = Some(line);
                Ok(())
            }
            BreakpointKind::Source { .. } => Err(DebuggerError::Internal(format!(
                "breakpoint {index} is a source breakpoint; its location is fixed"
            ))),
        }
    }

    /// Flip enabled↔disabled. A one-shot breakpoint collapses to disabled.
    ///
    /// Returns the new state.
    pub fn toggle_state(&mut self, index: u32) -> Result<BreakpointState, DebuggerError> {
        let bp = self.get_mut(index)?;
        bp.state = match bp.state {
            BreakpointState::Enabled | BreakpointState::Once => BreakpointState::Disabled,
            BreakpointState::Disabled => BreakpointState::Enabled,
        };
        Ok(bp.state)
    }

    /// Set a breakpoint's state. `Once` requires once-support.
    pub fn set_state(
        &mut self,
        index: u32,
        state: BreakpointState,
    ) -> Result<(), DebuggerError> {
        if state == BreakpointState::Once && !self.once_supported {
            return Err(DebuggerError::UnsupportedCapability("one-shot breakpoints"));
        }
        self.get_mut(index)?.state = state;
        Ok(())
    }

    /// Restore a state captured earlier, bypassing the once-support check.
    /// Used to roll back after a failed adapter reconciliation.
    pub(crate) fn force_state(&mut self, index: u32, state: BreakpointState) {
        if let Some(bp) = self.breakpoints.get_mut(&index) {
            bp.state = state;
        }
    }

    /// Enabled-or-once source breakpoints at `path`, ascending by index.
    pub fn get_all_enabled_breakpoints_for_source(&self, path: &str) -> Vec<&Breakpoint> {
        self.breakpoints
            .values()
            .filter(|bp| {
                bp.state.is_active()
                    && matches!(&bp.kind, BreakpointKind::Source { path: p, .. } if p == path)
            })
            .collect()
    }

    /// Enabled-or-once source breakpoints grouped by path. Paths with no
    /// active breakpoint are absent.
    pub fn get_all_enabled_breakpoints_by_path(&self) -> BTreeMap<String, Vec<&Breakpoint>> {
        let mut grouped: BTreeMap<String, Vec<&Breakpoint>> = BTreeMap::new();
        for bp in self.breakpoints.values() {
            if !bp.state.is_active() {
                continue;
            }
            if let BreakpointKind::Source { path, .. } = &bp.kind {
                grouped.entry(path.clone()).or_default().push(bp);
            }
        }
        grouped
    }

    /// Enabled-or-once function breakpoints, ascending by index.
    pub fn get_all_enabled_function_breakpoints(&self) -> Vec<&Breakpoint> {
        self.breakpoints
            .values()
            .filter(|bp| {
                bp.state.is_active() && matches!(bp.kind, BreakpointKind::Function { .. })
            })
            .collect()
    }

    /// Every path that carries any source breakpoint, regardless of state.
    /// Used to clear whole batches on the adapter.
    pub fn get_all_breakpoint_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .breakpoints
            .values()
            .filter_map(|bp| match &bp.kind {
                BreakpointKind::Source { path, .. } => Some(path.clone()),
                BreakpointKind::Function { .. } => None,
            })
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Whether any function breakpoint exists, regardless of state.
    pub fn has_function_breakpoints(&self) -> bool {
        self.breakpoints
            .values()
            .any(|bp| matches!(bp.kind, BreakpointKind::Function { .. }))
    }

    /// Every breakpoint, ascending by index.
    pub fn all(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }

    /// Number of breakpoints in the registry.
    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }
}
