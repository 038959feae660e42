//! Control-flow & operand-stack tracker.
//!
//! Mirrors the abstract stack of the WebAssembly validation algorithm: a
//! typed operand stack plus a stack of label scopes. Each scope records the
//! operand height at entry (its watermark); popping at or below the
//! innermost watermark is an underflow, unless the scope is unreachable, in
//! which case the pop yields the polymorphic [`StackType::Unknown`].

use crate::backend::Label;
use crate::error::CompileErrorKind;
use crate::types::ValType;

/// An abstract operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackType {
    Known(ValType),
    /// Appears only in unreachable code.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The function's implicit outer block; its target is the return.
    Function,
    Block,
    Loop,
    If,
    Else,
}

#[derive(Debug, Clone)]
pub struct LabelScope {
    pub kind: ScopeKind,
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
    /// Operand stack height at entry, with params already removed.
    pub height: usize,
    /// Branch target: loop start for loops, `end_label` otherwise.
    pub label: Label,
    pub end_label: Label,
    /// Pending branch point of an `if` that has not seen its `else`.
    pub else_label: Option<Label>,
    /// The rest of this scope cannot be reached.
    pub unreachable: bool,
    /// The scope was opened in unreachable code; nothing inside is emitted.
    pub dead: bool,
}

impl LabelScope {
    /// Types a branch to this scope carries: params for a loop, results
    /// otherwise.
    pub fn branch_types(&self) -> &[ValType] {
        match self.kind {
            ScopeKind::Loop => &self.params,
            _ => &self.results,
        }
    }
}

#[derive(Debug, Default)]
pub struct Tracker {
    operands: Vec<StackType>,
    scopes: Vec<LabelScope>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.operands.len()
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn innermost(&self) -> Result<&LabelScope, CompileErrorKind> {
        self.scopes
            .last()
            .ok_or(CompileErrorKind::UnbalancedControlStack)
    }

    fn innermost_mut(&mut self) -> Result<&mut LabelScope, CompileErrorKind> {
        self.scopes
            .last_mut()
            .ok_or(CompileErrorKind::UnbalancedControlStack)
    }

    /// Whether operations at the current position should be emitted.
    pub fn is_emitting(&self) -> bool {
        self.scopes
            .last()
            .is_some_and(|s| !s.unreachable && !s.dead)
    }

    /// Whether the innermost scope is unreachable (but possibly live).
    pub fn is_unreachable(&self) -> bool {
        self.scopes.last().is_some_and(|s| s.unreachable)
    }

    pub fn push(&mut self, ty: ValType) {
        self.operands.push(StackType::Known(ty));
    }

    /// Push an entry that may be the polymorphic unknown type.
    pub fn push_entry(&mut self, entry: StackType) {
        self.operands.push(entry);
    }

    pub fn push_all(&mut self, tys: &[ValType]) {
        self.operands
            .extend(tys.iter().map(|&ty| StackType::Known(ty)));
    }

    pub fn pop(&mut self) -> Result<StackType, CompileErrorKind> {
        let scope = self.innermost()?;
        if self.operands.len() <= scope.height {
            return if scope.unreachable {
                Ok(StackType::Unknown)
            } else {
                Err(CompileErrorKind::StackUnderflow)
            };
        }
        self.operands
            .pop()
            .ok_or(CompileErrorKind::StackUnderflow)
    }

    pub fn pop_expect(&mut self, expected: ValType) -> Result<StackType, CompileErrorKind> {
        match self.pop()? {
            StackType::Known(found) if found != expected => {
                Err(CompileErrorKind::TypeMismatch { expected, found })
            }
            other => Ok(other),
        }
    }

    /// Pop `tys` in reverse order (the last type is on top).
    pub fn pop_all(&mut self, tys: &[ValType]) -> Result<(), CompileErrorKind> {
        for &ty in tys.iter().rev() {
            self.pop_expect(ty)?;
        }
        Ok(())
    }

    /// Open a block/loop/if. The params are popped (validated) and pushed
    /// back above the new watermark.
    pub fn push_scope(
        &mut self,
        kind: ScopeKind,
        params: Vec<ValType>,
        results: Vec<ValType>,
        label: Label,
        end_label: Label,
        else_label: Option<Label>,
    ) -> Result<(), CompileErrorKind> {
        let dead = !self.is_emitting() && !self.scopes.is_empty();
        if !self.scopes.is_empty() {
            self.pop_all(&params)?;
        }
        let height = self.operands.len();
        self.push_all(&params);
        self.scopes.push(LabelScope {
            kind,
            params,
            results,
            height,
            label,
            end_label,
            else_label,
            unreachable: false,
            dead,
        });
        Ok(())
    }

    /// Check the stack above the watermark is exactly the scope's results.
    fn check_results(&mut self) -> Result<(), CompileErrorKind> {
        let scope = self.innermost()?;
        let results = scope.results.clone();
        let height = scope.height;
        self.pop_all(&results)?;
        if self.operands.len() != height {
            return Err(CompileErrorKind::StackHeightMismatch {
                expected: results.len(),
                found: self.operands.len() - height + results.len(),
            });
        }
        Ok(())
    }

    /// `else`: validate the then-arm and restart at the scope's params.
    /// Returns the scope as it was before the switch.
    pub fn switch_to_else(&mut self) -> Result<LabelScope, CompileErrorKind> {
        if self.innermost()?.kind != ScopeKind::If {
            return Err(CompileErrorKind::ElseWithoutIf);
        }
        self.check_results()?;
        let scope = self.innermost_mut()?;
        let before = scope.clone();
        scope.kind = ScopeKind::Else;
        scope.else_label = None;
        scope.unreachable = false;
        let params = scope.params.clone();
        self.push_all(&params);
        Ok(before)
    }

    /// `end`: validate results, pop the scope and push its results onto the
    /// enclosing stack. Returns the popped scope.
    pub fn pop_scope(&mut self) -> Result<LabelScope, CompileErrorKind> {
        let scope = self.innermost()?;
        if scope.kind == ScopeKind::If && scope.params != scope.results {
            return Err(CompileErrorKind::IfWithoutElseTypeMismatch);
        }
        self.check_results()?;
        let scope = self
            .scopes
            .pop()
            .ok_or(CompileErrorKind::UnbalancedControlStack)?;
        self.push_all(&scope.results);
        Ok(scope)
    }

    /// Everything after an unconditional transfer is unreachable.
    pub fn set_unreachable(&mut self) -> Result<(), CompileErrorKind> {
        let scope = self.innermost_mut()?;
        scope.unreachable = true;
        let height = scope.height;
        self.operands.truncate(height);
        Ok(())
    }

    /// Scope `depth` levels out (0 = innermost).
    pub fn scope_at(&self, depth: u32) -> Result<&LabelScope, CompileErrorKind> {
        self.scopes
            .len()
            .checked_sub(depth as usize + 1)
            .and_then(|i| self.scopes.get(i))
            .ok_or(CompileErrorKind::InvalidBranchDepth(depth))
    }

    /// Depth of the function scope, the target of `return`.
    pub fn function_depth(&self) -> u32 {
        self.scopes.len().saturating_sub(1) as u32
    }

    /// Types of the entries a branch to `depth` discards: everything between
    /// the target's watermark and the values it carries.
    pub fn excess_for_branch(&self, depth: u32) -> Result<Vec<ValType>, CompileErrorKind> {
        let target = self.scope_at(depth)?;
        let arity = target.branch_types().len();
        let top = self.operands.len().saturating_sub(arity);
        Ok(self
            .operands
            .get(target.height..top)
            .unwrap_or(&[])
            .iter()
            .filter_map(|entry| match entry {
                StackType::Known(ty) => Some(*ty),
                StackType::Unknown => None,
            })
            .collect())
    }
}
