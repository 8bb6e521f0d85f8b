//! The per-context execution stack: an ordered sequence of [`StackFrame`]s
//! with an `ExplicitCall` always at the bottom.
//!
//! Modeled on `LocalCall`/stack handling where the stack is a root call
//! plus a `Vec<LocalCall>`. This runtime folds the root and its descendants
//! into one `Vec<StackFrame>`; this module enforces the invariants that
//! distinction used to get for free.

use protocol::prelude::*;

/// The execution stack owned by one `ContextActor`.
///
/// Empty iff the context is idle (no `ExplicitCall` pushed yet, or the last
/// frame was just popped).
#[derive(Clone, Debug, Default)]
pub struct ExecutionStack {
    frames: Vec<StackFrame>,
}

impl ExecutionStack {
    /// A fresh, empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stack's frames, bottom first.
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Whether the stack has no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The top frame, if any.
    pub fn top(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    /// The module named by this stack's bottom `ExplicitCall`, if the stack
    /// is non-empty.
    ///
    /// Used by module-edit invalidation to decide whether a context's
    /// stack "references a frame in" the edited module: the
    /// `LocalCall` frames above the root carry only an `ExpressionId`, not a
    /// module name, so the root call's module is the coarsest (and only
    /// directly available) signal for that decision.
    pub fn root_module(&self) -> Option<&str> {
        match self.frames.first() {
            Some(StackFrame::ExplicitCall { method_ptr, .. }) => Some(method_ptr.module.as_str()),
            _ => None,
        }
    }

    /// Validate and push `frame`.
    ///
    /// The first frame pushed onto an empty stack must be an
    /// `ExplicitCall`; every subsequent frame must be a `LocalCall` whose
    /// `expression_id` is present in `cached_in_frame_above` (the value
    /// cache's view of what the current top frame has already computed).
    /// Neither push validates anything beyond frame shape/order — whether
    /// the referenced expression id is *resolvable* inside that frame's
    /// lexical scope is the caller's responsibility, since that requires
    /// cache state this type does not hold.
    pub fn push(&mut self, frame: StackFrame, resolvable: bool) -> FallibleResult<()> {
        match (&frame, self.frames.is_empty()) {
            (StackFrame::ExplicitCall { .. }, true) => {
                self.frames.push(frame);
                Ok(())
            }
            (StackFrame::ExplicitCall { .. }, false) => {
                Err(RuntimeError::InvalidStackItem { reason: "an ExplicitCall can only be the bottom frame".into() })
            }
            (StackFrame::LocalCall { .. }, true) => {
                Err(RuntimeError::InvalidStackItem { reason: "a LocalCall cannot be pushed onto an empty stack".into() })
            }
            (StackFrame::LocalCall { .. }, false) if !resolvable => Err(RuntimeError::InvalidStackItem {
                reason: "LocalCall expression is not resolvable in the current top frame".into(),
            }),
            (StackFrame::LocalCall { .. }, false) => {
                self.frames.push(frame);
                Ok(())
            }
        }
    }

    /// Pop the top frame.
    ///
    /// Fails with [`RuntimeError::EmptyStack`] if the stack is already
    /// empty. Popping the sole `ExplicitCall` leaves the stack empty (the
    /// context becomes idle).
    pub fn pop(&mut self) -> FallibleResult<StackFrame> {
        self.frames.pop().ok_or(RuntimeError::EmptyStack)
    }

    /// A deep copy of this stack, used by `ContextRegistry::fork`.
    pub fn fork(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explicit_call() -> StackFrame {
        StackFrame::ExplicitCall {
            method_ptr: MethodPointer { module: "Main".into(), defined_on_type: "Main".into(), name: "main".into() },
            this_arg: None,
            positional_args: vec![],
        }
    }

    fn local_call() -> StackFrame {
        StackFrame::LocalCall { expression_id: ExpressionId::new_v4() }
    }

    #[test]
    fn push_local_call_onto_empty_stack_fails() {
        let mut stack = ExecutionStack::new();
        let result = stack.push(local_call(), true);
        assert!(matches!(result, Err(RuntimeError::InvalidStackItem { .. })));
    }

    #[test]
    fn push_explicit_call_onto_nonempty_stack_fails() {
        let mut stack = ExecutionStack::new();
        stack.push(explicit_call(), true).unwrap();
        let result = stack.push(explicit_call(), true);
        assert!(matches!(result, Err(RuntimeError::InvalidStackItem { .. })));
    }

    #[test]
    fn push_unresolvable_local_call_fails() {
        let mut stack = ExecutionStack::new();
        stack.push(explicit_call(), true).unwrap();
        let result = stack.push(local_call(), false);
        assert!(matches!(result, Err(RuntimeError::InvalidStackItem { .. })));
    }

    #[test]
    fn pop_on_empty_stack_fails() {
        let mut stack = ExecutionStack::new();
        assert_eq!(stack.pop(), Err(RuntimeError::EmptyStack));
    }

    #[test]
    fn push_then_pop_restores_prior_state() {
        let mut stack = ExecutionStack::new();
        stack.push(explicit_call(), true).unwrap();
        let before = stack.frames().to_vec();
        stack.push(local_call(), true).unwrap();
        stack.pop().unwrap();
        assert_eq!(stack.frames(), before.as_slice());
    }

    #[test]
    fn fork_is_independent() {
        let mut stack = ExecutionStack::new();
        stack.push(explicit_call(), true).unwrap();
        let mut forked = stack.fork();
        forked.push(local_call(), true).unwrap();
        assert_ne!(stack.frames().len(), forked.frames().len());
    }
}
