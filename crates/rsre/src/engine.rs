use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rhai::{Dynamic, Engine, FnPtr, Scope, AST};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::bindings::timers::SharedTimers;
use crate::config::EngineLimits;
use crate::error::{HostError, Result};

/// Create a Rhai engine configured with the given limits
pub(crate) fn build_engine(limits: &EngineLimits) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_function_expr_depth);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_array_size);
    engine.set_max_map_size(limits.max_map_size);

    engine.on_debug(|text, source, pos| {
        debug!(target: "scripting", "[{}:{}] {}", source.unwrap_or("script"), pos, text);
    });

    engine
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Script functions accumulated across evaluations, plus globals produced by
/// nested `loadScript` calls that are waiting to be merged into the scope.
///
/// Shared between the engine and the `loadScript` binding. Both only ever run
/// on the dispatch thread.
#[derive(Clone)]
pub(crate) struct Library {
    functions: Arc<Mutex<AST>>,
    staged_globals: Arc<Mutex<Vec<(String, Dynamic)>>>,
}

impl Library {
    fn new() -> Self {
        Self {
            functions: Arc::new(Mutex::new(AST::empty())),
            staged_globals: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The current function library merged with `ast`'s statements
    fn program(&self, ast: &AST) -> AST {
        lock(&self.functions).merge(ast)
    }

    fn snapshot(&self) -> AST {
        lock(&self.functions).clone()
    }

    /// Keep the function definitions of `ast` for later evaluations
    fn absorb(&self, ast: &AST) {
        lock(&self.functions).combine(ast.clone_functions_only());
    }

    fn stage_globals(&self, scope: &Scope) {
        let mut staged = lock(&self.staged_globals);
        for (name, _, value) in scope.iter() {
            staged.push((name.to_string(), value));
        }
    }

    fn take_staged(&self) -> Vec<(String, Dynamic)> {
        std::mem::take(&mut *lock(&self.staged_globals))
    }

    /// Compile and run a script file against `scope`.
    ///
    /// Top-level variables of the file land directly in `scope`. Its
    /// functions join the library, which the evaluation currently running
    /// cannot see; they are callable from the next evaluation on.
    pub(crate) fn run_file(&self, engine: &Engine, scope: &mut Scope, path: &Path) -> Result<()> {
        let source = fs::read_to_string(path).map_err(|e| HostError::io(path, e))?;
        let mut ast = engine.compile(&source)?;
        ast.set_source(path.to_string_lossy().to_string());

        let program = self.program(&ast);
        let result = engine.run_ast_with_scope(scope, &program);
        self.absorb(&ast);
        Ok(result?)
    }

    /// Run a script file in a scope of its own and stage its top-level
    /// variables for the global scope.
    pub(crate) fn load_file(&self, engine: &Engine, path: &Path) -> Result<()> {
        let mut scope = Scope::new();
        self.run_file(engine, &mut scope, path)?;
        self.stage_globals(&scope);
        Ok(())
    }
}

/// The embedded interpreter and its global state.
///
/// Only the dispatch loop owns one of these. Global variables live in a
/// persistent scope and every function a script defines stays callable by
/// later evaluations and timer callbacks.
pub struct ScriptEngine {
    engine: Engine,
    scope: Scope<'static>,
    library: Library,
    timers: SharedTimers,
}

impl ScriptEngine {
    pub(crate) fn new(limits: &EngineLimits, timers: SharedTimers) -> Self {
        Self {
            engine: build_engine(limits),
            scope: Scope::new(),
            library: Library::new(),
            timers,
        }
    }

    /// Compile source text into a runnable unit without running it
    pub fn compile(&self, name: &str, source: &str) -> Result<AST> {
        let mut ast = self.engine.compile(source)?;
        ast.set_source(name.to_string());
        Ok(ast)
    }

    /// Compile and run source text against the global scope
    pub fn run(&mut self, source: &str) -> Result<Dynamic> {
        let ast = self.engine.compile(source)?;
        self.run_ast(&ast)
    }

    /// Compile under the given source name, then run
    pub fn compile_and_run(&mut self, name: &str, source: &str) -> Result<Dynamic> {
        let ast = self.compile(name, source)?;
        self.run_ast(&ast)
    }

    /// Run a compiled unit against the global scope
    pub fn run_ast(&mut self, ast: &AST) -> Result<Dynamic> {
        let program = self.library.program(ast);
        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut self.scope, &program);

        // Definitions are kept even when the run fails part way
        self.library.absorb(ast);
        self.merge_staged_globals();

        Ok(result?)
    }

    /// Read a global variable
    pub fn get(&self, name: &str) -> Result<Dynamic> {
        self.scope
            .get_value::<Dynamic>(name)
            .ok_or_else(|| HostError::UnknownVariable(name.to_string()))
    }

    /// Create or overwrite a global variable
    pub fn set(&mut self, name: &str, value: Dynamic) -> Result<()> {
        if self.scope.is_constant(name) == Some(true) {
            return Err(HostError::ConstantVariable(name.to_string()));
        }
        self.scope.set_or_push(name.to_string(), value);
        Ok(())
    }

    /// Call a function pointer (named function or closure) with arguments
    pub fn call_function(&mut self, function: &FnPtr, args: Vec<Dynamic>) -> Result<Dynamic> {
        let library = self.library.snapshot();
        let result = function.call::<Dynamic>(&self.engine, &library, args);
        self.merge_staged_globals();
        Ok(result?)
    }

    /// Call a script-defined function by name
    pub fn call_named(&mut self, name: &str, args: Vec<Dynamic>) -> Result<Dynamic> {
        let library = self.library.snapshot();
        let result = self
            .engine
            .call_fn::<Dynamic>(&mut self.scope, &library, name, args);
        self.merge_staged_globals();
        Ok(result?)
    }

    /// Compile and run a script file against the global scope. Relative
    /// paths resolve against the current directory.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let result = self.library.run_file(&self.engine, &mut self.scope, path);
        self.merge_staged_globals();
        result
    }

    /// Number of timers currently armed
    pub fn active_timers(&self) -> usize {
        crate::bindings::timers::lock(&self.timers).len()
    }

    /// Access the underlying engine, e.g. to register native functions
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// The global scope
    pub fn scope(&self) -> &Scope<'static> {
        &self.scope
    }

    pub(crate) fn library(&self) -> &Library {
        &self.library
    }

    pub(crate) fn timers(&self) -> &SharedTimers {
        &self.timers
    }

    fn merge_staged_globals(&mut self) {
        for (name, value) in self.library.take_staged() {
            if self.scope.is_constant(&name) == Some(true) {
                debug!(target: "scripting", "Skipping staged global {}: constant", name);
                continue;
            }
            self.scope.set_or_push(name, value);
        }
    }
}

/// Convert host data into an engine value
pub fn to_dynamic<T: Serialize>(value: &T) -> Result<Dynamic> {
    rhai::serde::to_dynamic(value).map_err(|e| HostError::Conversion(e.to_string()))
}

/// Convert an engine value into host data
pub fn from_dynamic<T: DeserializeOwned>(value: &Dynamic) -> Result<T> {
    rhai::serde::from_dynamic(value).map_err(|e| HostError::Conversion(e.to_string()))
}
