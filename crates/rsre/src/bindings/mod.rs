//! Native capabilities exposed to scripts.
//!
//! All bindings run on the dispatch thread while a script is executing.
//! They use the engine directly and must never go through
//! [`ScriptHost::submit`](crate::ScriptHost::submit), which would deadlock.
//!
//! `loadScript(path)` is custom syntax so it can run the file against the
//! caller's scope. At the top level of an evaluation the loaded file's
//! variables are usable by the very next statement. Inside a function or
//! timer callback they are merged into the globals once that call returns.
//! Functions defined by the loaded file can only be called from the next
//! evaluation on: Rhai resolves script functions against the program that
//! is already running, which cannot be extended mid-run.

pub mod fs;
pub mod process;
pub mod timers;

use std::path::PathBuf;

use rhai::{Dynamic, EvalContext, Expression, ImmutableString};
use tracing::{debug, warn};

use crate::config::{resolve_path, HostConfig};
use crate::engine::{Library, ScriptEngine};
use crate::pretty::pretty_print;

/// Stringify a script argument. Strings are used as-is, anything else is
/// formatted.
pub(crate) fn arg_string(value: &Dynamic) -> String {
    let value = value.flatten_clone();
    match value.clone().try_cast::<ImmutableString>() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

/// Map a failed operation to the script-visible `false` sentinel
pub(crate) fn or_false<E>(result: Result<Dynamic, E>) -> Dynamic {
    result.unwrap_or(Dynamic::FALSE)
}

fn register_load_script(
    engine: &mut rhai::Engine,
    asset_root: PathBuf,
    library: Library,
) -> crate::Result<()> {
    engine.register_custom_syntax(
        ["loadScript", "(", "$expr$", ")"],
        true,
        move |context: &mut EvalContext, inputs: &[Expression]| {
            let path = context.eval_expression_tree(&inputs[0])?;
            let path = resolve_path(&asset_root, arg_string(&path));

            let engine = context.engine();
            let result = if context.call_level() == 0 {
                library.run_file(engine, context.scope_mut(), &path)
            } else {
                library.load_file(engine, &path)
            };

            match result {
                Ok(()) => {
                    debug!(target: "scripting", "Loaded script {}", path.display());
                    Ok(Dynamic::TRUE)
                }
                Err(e) => {
                    warn!(target: "scripting", "loadScript {} failed: {}", path.display(), e);
                    Ok(Dynamic::FALSE)
                }
            }
        },
    )?;
    Ok(())
}

/// Install every builtin into the engine
pub(crate) fn install(engine: &mut ScriptEngine, config: &HostConfig) -> crate::Result<()> {
    let timers = engine.timers().clone();
    let library = engine.library().clone();
    let argv = config
        .argv
        .clone()
        .unwrap_or_else(|| std::env::args().collect());

    let rhai = engine.engine_mut();
    rhai.register_fn("prettyPrint", |value: Dynamic| pretty_print(&value));
    fs::register(rhai);
    process::register(rhai, argv);
    timers::register(rhai, &timers);
    register_load_script(rhai, config.asset_root.clone(), library)
}
