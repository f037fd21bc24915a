//! The orchestrator (spec.md §4.5, component **O**): advances modules
//! through the collect -> resolve -> check pipeline in dependency order,
//! detecting import cycles along the way.

use log::{info, warn};

use crate::{
    collector, context::AnalysisContext, diagnostics::AnalysisError, module::{Entry, ModuleKey, Phase}, resolver, typecheck,
};

/// Advances `module_key` to (at least) `target`. Idempotent: a module
/// already at or beyond `target` returns immediately. Recurses into the
/// module's own imports first, advancing each to `target`'s import
/// prerequisite phase, then runs the corresponding walker and stamps the
/// phase.
///
/// A module the collector found on an import cycle is `blocked` and never
/// advances again regardless of which caller reaches it (spec.md §8, "no
/// phase change beyond Collected for either"); the actual cycle detection
/// happens in `collector::find_import_cycle`, not here.
pub fn advance(ctx: &mut AnalysisContext, module_key: &ModuleKey, target: Phase) -> Result<(), AnalysisError> {
    let Some(module) = ctx.registry.get(module_key) else {
        return Err(AnalysisError::ModuleNotFound(module_key.clone()));
    };

    if module.blocked {
        return Err(AnalysisError::ImportCycle(vec![module_key.clone()]));
    }

    if module.phase() >= target {
        return Ok(());
    }

    if let Some(prerequisite) = target.import_prerequisite() {
        // Bring this module itself through the immediately preceding phase
        // first. `import_prerequisite` doubles as "the phase right before
        // `target`" for Collected/Resolved/Checked, so this recursion also
        // terminates at Parsed. Only after self is at `prerequisite` do its
        // imports become known (collect() is what populates `module.imports`
        // from the AST's `use` statements).
        advance(ctx, module_key, prerequisite)?;

        let module = ctx.registry.get(module_key).expect("module exists");
        let imports: Vec<ModuleKey> = module.referenced_modules();
        for import_key in imports {
            if let Err(err) = advance(ctx, &import_key, prerequisite) {
                warn!("import '{import_key}' of '{module_key}' failed to reach {prerequisite:?}: {err}");
                return Err(err);
            }
        }
    }

    if let Some(module) = ctx.registry.get_mut(module_key) {
        module.entry = Entry::InProgress(target);
    }

    match target {
        Phase::NotStarted | Phase::Parsed => {}
        Phase::Collected => collector::collect(ctx, module_key),
        Phase::Resolved => resolver::resolve(ctx, module_key),
        Phase::Checked => typecheck::typecheck(ctx, module_key),
    }

    if let Some(module) = ctx.registry.get_mut(module_key) {
        module.entry = Entry::Done(target);
    }

    Ok(())
}

/// Advances every registered module through every phase up to and
/// including `Checked`. One module's critical failure does not stop
/// advancement of the others (spec.md §7, "Critical" row applies per
/// module, not process-wide).
pub fn run_all(ctx: &mut AnalysisContext) {
    let keys: Vec<ModuleKey> = ctx.registry.keys().cloned().collect();
    for key in keys {
        if let Err(err) = advance(ctx, &key, Phase::Checked) {
            warn!("module '{key}' did not reach Checked: {err}");
        }
    }
    info!("analysis complete: {} diagnostic(s)", ctx.report.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::FileAst,
        file::SourceFile,
        module::{Category as ModuleCategory, ImportBinding, Module},
    };

    fn register(ctx: &mut AnalysisContext, name: &str) -> ModuleKey {
        let key = ModuleKey::new(name.to_string());
        let top_scope = ctx.new_module_scope(key.clone());
        let ast = FileAst { file: SourceFile::new(vec![name.into()], String::new()), imports: vec![], items: vec![] };
        ctx.registry.insert(Module::new(key.clone(), std::rc::Rc::new(ast), top_scope, ModuleCategory::Local));
        key
    }

    #[test]
    fn advancing_is_idempotent() {
        let mut ctx = AnalysisContext::new("m", false);
        let key = register(&mut ctx, "a");
        advance(&mut ctx, &key, Phase::Collected).unwrap();
        advance(&mut ctx, &key, Phase::Collected).unwrap();
        assert_eq!(ctx.registry.get(&key).unwrap().phase(), Phase::Collected);
    }

    #[test]
    fn import_cycle_is_detected() {
        let mut ctx = AnalysisContext::new("m", false);
        let a = register(&mut ctx, "a");
        let b = register(&mut ctx, "b");
        ctx.registry.get_mut(&a).unwrap().imports.insert(
            "b".to_string(),
            ImportBinding { target: b.clone(), position: 0..1, used: true },
        );
        ctx.registry.get_mut(&b).unwrap().imports.insert(
            "a".to_string(),
            ImportBinding { target: a.clone(), position: 0..1, used: true },
        );

        let result = advance(&mut ctx, &a, Phase::Resolved);
        assert!(result.is_err());
        // a's own collect() is what notices the cycle (both import maps are
        // fully known up front here), so a itself still reaches Collected;
        // b is blocked before its own collect() ever runs.
        assert_eq!(ctx.registry.get(&a).unwrap().phase(), Phase::Collected);
        assert!(ctx.registry.get(&a).unwrap().blocked);
        assert!(ctx.registry.get(&b).unwrap().blocked);
        assert!(advance(&mut ctx, &b, Phase::Checked).is_err(), "a blocked module stays blocked for later callers too");
    }

    #[test]
    fn advancing_resolves_imports_first() {
        let mut ctx = AnalysisContext::new("m", false);
        let a = register(&mut ctx, "a");
        let b = register(&mut ctx, "b");
        ctx.registry.get_mut(&a).unwrap().imports.insert(
            "b".to_string(),
            ImportBinding { target: b.clone(), position: 0..1, used: true },
        );

        advance(&mut ctx, &a, Phase::Resolved).unwrap();
        assert_eq!(ctx.registry.get(&b).unwrap().phase(), Phase::Collected);
        assert_eq!(ctx.registry.get(&a).unwrap().phase(), Phase::Resolved);
    }
}
