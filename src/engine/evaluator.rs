//! Bundled SCSS evaluator
//!
//! Walks the parsed stylesheet, keeping variable scopes and following imports,
//! and evaluates every variable declaration's expression. Host functions from
//! the [`FunctionRegistry`] are called as they are encountered, in document order.
//!
//! Supported:
//! - variable declarations with `!default` and `!global`
//! - nested scopes for rules and `@media`/`@supports`/`@at-root` blocks
//! - `@import` through the [`Importer`]
//! - `@use` and `@forward` with namespaces (`ns.$var`, `ns.fn()`), `as *`,
//!   `as prefix-*` and `with (...)` configuration; `sass:` built-in modules
//! - `@function`/`@return` with default, keyword and rest parameters
//! - `@if`/`@else if`/`@else`, `@each`, `@for`, `@while`, `@error`, `@warn` and `@debug`
//! - lists, maps, arithmetic, comparisons, boolean logic, interpolation and
//!   the built-in functions in `builtins.rs`
//!
//! Not supported: mixins and CSS output. `@mixin` and `@include` are skipped.

use std::collections::HashMap;
use std::future::Future;
use std::mem;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, trace, warn};
use serde::Deserialize;

use super::builtins;
use super::color::Color;
use super::error::{EngineError, EngineResult};
use super::module::{configured_variables, Module, ModuleRule, Namespace, Namespaces, UserFunction};
use super::value::SassValue;
use super::{normalize_name, Engine, FunctionRegistry, ImportOrigin, Importer};
use crate::scss::constants::*;
use crate::scss::query::first_child;
use crate::scss::{stringify, Node, ScssParser};

/// Functions whose arguments are passed through to CSS untouched
const RAW_CSS_FUNCTIONS: &[&str] = &["url", "calc", "var", "env", "element", "expression"];

/// Binary operators from lowest to highest precedence
const PRECEDENCE: &[&[&str]] = &[
    &["or"],
    &["and"],
    &["==", "!="],
    &["<", "<=", ">", ">="],
    &["+", "-"],
    &["*", "/", "%"],
];

/// Evaluator settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EvaluatorOptions {
    /// Maximum nesting of imports; also stops import cycles
    pub max_import_depth: usize,
    /// Maximum nesting of `@function` calls; stops runaway recursion
    pub max_call_depth: usize,
    /// Iterations a single `@for`/`@while` loop may run
    pub max_loop_iterations: usize,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            max_import_depth: 64,
            max_call_depth: 100,
            max_loop_iterations: 100_000,
        }
    }
}

/// The bundled [`Engine`]
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    options: EvaluatorOptions,
    parser: ScssParser,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EvaluatorOptions) -> Self {
        Self {
            options,
            parser: ScssParser::new(),
        }
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }
}

#[async_trait]
impl Engine for Evaluator {
    async fn render(
        &self,
        source: &str,
        importer: &mut dyn Importer,
        functions: &mut FunctionRegistry<'_>,
    ) -> EngineResult<()> {
        let tree = self.parser.parse(source)?;
        let origin = ImportOrigin::Stdin;
        let mut render = Render {
            importer,
            functions,
            parser: &self.parser,
            options: &self.options,
            current: ModuleState::new(HashMap::new(), None),
            modules: HashMap::new(),
            import_depth: 0,
            call_depth: 0,
        };
        render.eval_block(tree.children(), &origin).await
    }
}

type EvalFuture<'a> = Pin<Box<dyn Future<Output = EngineResult<()>> + Send + 'a>>;

#[derive(Debug, Default)]
struct Scope {
    variables: HashMap<String, SassValue>,
    /// Loop bodies reassign variables of enclosing scopes instead of shadowing them
    control: bool,
}

/// Members of the stylesheet being evaluated
#[derive(Debug, Default)]
struct ModuleState {
    /// Innermost scope last; the first one is global
    scopes: Vec<Scope>,
    functions: HashMap<String, Arc<UserFunction>>,
    namespaces: Namespaces,
    /// `None` for the entry stylesheet
    path: Option<PathBuf>,
}

impl ModuleState {
    fn new(variables: HashMap<String, SassValue>, path: Option<PathBuf>) -> Self {
        Self {
            scopes: vec![Scope {
                variables,
                control: false,
            }],
            functions: HashMap::new(),
            namespaces: Namespaces::default(),
            path,
        }
    }

    /// State for running code of an already evaluated module
    fn of(module: &Module, path: PathBuf) -> Self {
        Self {
            functions: module.functions.clone(),
            namespaces: module.namespaces.clone(),
            ..Self::new(module.variables.clone(), Some(path))
        }
    }
}

/// Where a statement list runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Within {
    Stylesheet,
    Function,
}

/// An at-rule split into its parts
struct AtRule<'n> {
    keyword: &'n str,
    params: &'n [Node],
    block: &'n [Node],
}

impl<'n> AtRule<'n> {
    fn of(node: &'n Node) -> Self {
        let children = node.children();
        Self {
            keyword: children.first().and_then(Node::text).unwrap_or_default(),
            params: at_rule_params(children),
            block: first_child(node, NODE_BLOCK).map(Node::children).unwrap_or_default(),
        }
    }
}

/// Evaluated call arguments
#[derive(Debug, Default)]
struct Arguments {
    positional: Vec<SassValue>,
    /// Normalized names without the `$`
    named: Vec<(String, SassValue)>,
}

impl Arguments {
    /// Host and built-in functions take positional arguments only
    fn into_positional(self, name: &str) -> EngineResult<Vec<SassValue>> {
        match self.named.first() {
            None => Ok(self.positional),
            Some((keyword, _)) => Err(EngineError::Function {
                name: name.to_string(),
                message: format!("keyword argument ${} is not supported", keyword),
            }),
        }
    }
}

/// How to get back to the caller after a `@function` call
enum Caller {
    /// Local scopes above the global one
    Scopes(Vec<Scope>),
    /// The calling module, when the function belongs to another one
    Module(ModuleState),
}

/// State of one render pass
struct Render<'r, 'f> {
    importer: &'r mut dyn Importer,
    functions: &'r mut FunctionRegistry<'f>,
    parser: &'r ScssParser,
    options: &'r EvaluatorOptions,
    current: ModuleState,
    /// Modules loaded by `@use`/`@forward`, keyed by resolved path
    modules: HashMap<PathBuf, Arc<Module>>,
    import_depth: usize,
    call_depth: usize,
}

impl<'r, 'f> Render<'r, 'f> {
    /// Evaluate a list of statements. Boxed because imports and blocks recurse.
    fn eval_block<'a>(&'a mut self, nodes: &'a [Node], origin: &'a ImportOrigin) -> EvalFuture<'a> {
        Box::pin(async move {
            // Whether a branch of the current @if/@else chain already ran
            let mut chain: Option<bool> = None;

            for node in nodes {
                match node.kind.as_str() {
                    NODE_DECLARATION => self.eval_declaration(node)?,
                    NODE_RULE => {
                        if let Some(block) = first_child(node, NODE_BLOCK) {
                            self.eval_scoped(block.children(), origin).await?;
                        }
                    }
                    NODE_AT_RULE => {
                        let rule = AtRule::of(node);
                        match rule.keyword {
                            "if" | "else" => {
                                let (next, taken) = self.conditional(&rule, chain)?;
                                chain = next;
                                if taken {
                                    self.eval_block(rule.block, origin).await?;
                                }
                                continue;
                            }
                            "import" => self.eval_import(rule.params, origin).await?,
                            "use" => self.eval_use(rule.params, origin).await?,
                            "forward" => self.eval_forward(rule.params, origin).await?,
                            "media" | "supports" | "at-root" => self.eval_scoped(rule.block, origin).await?,
                            _ => {
                                self.exec_at_rule(&rule, Within::Stylesheet)?;
                            }
                        }
                    }
                    _ => continue,
                }
                chain = None;
            }

            Ok(())
        })
    }

    async fn eval_scoped(&mut self, nodes: &[Node], origin: &ImportOrigin) -> EngineResult<()> {
        self.current.scopes.push(Scope::default());
        let result = self.eval_block(nodes, origin).await;
        self.current.scopes.pop();
        result
    }

    /// Run a statement list without awaiting; used for loop and function bodies.
    /// Returns the value of an `@return`.
    fn exec_block(&mut self, nodes: &[Node], within: Within) -> EngineResult<Option<SassValue>> {
        let mut chain: Option<bool> = None;

        for node in nodes {
            let returned = match node.kind.as_str() {
                NODE_DECLARATION => {
                    self.eval_declaration(node)?;
                    None
                }
                NODE_RULE if within == Within::Function => {
                    return Err(evaluation("Style rules are not allowed in functions."));
                }
                NODE_RULE => match first_child(node, NODE_BLOCK) {
                    Some(block) => self.exec_scoped(block.children(), within)?,
                    None => None,
                },
                NODE_AT_RULE => {
                    let rule = AtRule::of(node);
                    if matches!(rule.keyword, "if" | "else") {
                        let (next, taken) = self.conditional(&rule, chain)?;
                        chain = next;
                        if taken {
                            if let Some(value) = self.exec_block(rule.block, within)? {
                                return Ok(Some(value));
                            }
                        }
                        continue;
                    }
                    self.exec_at_rule(&rule, within)?
                }
                _ => continue,
            };
            chain = None;
            if returned.is_some() {
                return Ok(returned);
            }
        }

        Ok(None)
    }

    fn exec_scoped(&mut self, nodes: &[Node], within: Within) -> EngineResult<Option<SassValue>> {
        self.current.scopes.push(Scope::default());
        let result = self.exec_block(nodes, within);
        self.current.scopes.pop();
        result
    }

    /// At-rules that never await: everything except imports and block recursion
    fn exec_at_rule(&mut self, rule: &AtRule<'_>, within: Within) -> EngineResult<Option<SassValue>> {
        match (rule.keyword, within) {
            ("return", Within::Function) => self.eval_expression(rule.params).map(Some),
            ("return", Within::Stylesheet) => Err(evaluation("@return may only be used within a function.")),
            ("each", _) => self.exec_each(rule, within),
            ("for", _) => self.exec_for(rule, within),
            ("while", _) => self.exec_while(rule, within),
            ("error" | "warn" | "debug", _) => {
                self.report(rule)?;
                Ok(None)
            }
            ("function", Within::Stylesheet) => {
                self.define_function(rule)?;
                Ok(None)
            }
            ("media" | "supports" | "at-root", Within::Stylesheet) => self.exec_scoped(rule.block, within),
            ("import" | "use" | "forward" | "function", _) => {
                Err(evaluation(format!("@{} is not allowed here.", rule.keyword)))
            }
            (_, Within::Function) => Err(evaluation(format!(
                "@{} is not allowed in functions.",
                rule.keyword
            ))),
            (_, Within::Stylesheet) => {
                debug!("Skipping @{} rule", rule.keyword);
                Ok(None)
            }
        }
    }

    /// Decide one link of an `@if`/`@else` chain.
    /// Returns the chain state after it and whether its block runs.
    fn conditional(&mut self, rule: &AtRule<'_>, chain: Option<bool>) -> EngineResult<(Option<bool>, bool)> {
        if rule.keyword == "if" {
            let taken = self.eval_expression(rule.params)?.is_truthy();
            return Ok((Some(taken), taken));
        }

        let Some(already_taken) = chain else {
            return Err(evaluation("@else must come after @if."));
        };
        let condition = else_if_condition(rule.params);
        if already_taken {
            return Ok((condition.map(|_| true), false));
        }
        let taken = match condition {
            Some(condition) => self.eval_expression(condition)?.is_truthy(),
            None => true,
        };
        Ok((condition.map(|_| taken), taken))
    }

    fn report(&mut self, rule: &AtRule<'_>) -> EngineResult<()> {
        let value = self.eval_expression(rule.params)?;
        match rule.keyword {
            "error" => return Err(EngineError::User(value.to_unquoted_text())),
            "warn" => warn!("@warn: {}", value.to_unquoted_text()),
            _ => debug!("@debug: {}", value),
        }
        Ok(())
    }

    fn exec_each(&mut self, rule: &AtRule<'_>, within: Within) -> EngineResult<Option<SassValue>> {
        let Some(split) = keyword_position(rule.params, "in") else {
            return Err(evaluation("Expected \"in\" in @each."));
        };
        let variables: Vec<String> = rule.params[..split]
            .iter()
            .filter(|node| node.is(NODE_VARIABLE))
            .filter_map(Node::text)
            .map(normalize_name)
            .collect();
        if variables.is_empty() {
            return Err(evaluation("Expected a variable in @each."));
        }

        let list = self.eval_expression(&rule.params[split + 1..])?;
        for item in list.as_list() {
            let mut frame = HashMap::new();
            if let [variable] = variables.as_slice() {
                frame.insert(variable.clone(), item);
            } else {
                // `@each $key, $value in $map` destructures each element
                let parts = item.as_list();
                for (index, variable) in variables.iter().enumerate() {
                    frame.insert(variable.clone(), parts.get(index).cloned().unwrap_or(SassValue::Null));
                }
            }
            if let Some(value) = self.exec_iteration(frame, rule.block, within)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn exec_for(&mut self, rule: &AtRule<'_>, within: Within) -> EngineResult<Option<SassValue>> {
        let params = rule.params;
        let Some(from) = keyword_position(params, "from") else {
            return Err(evaluation("Expected \"from\" in @for."));
        };
        let (bound, inclusive) = match (keyword_position(params, "through"), keyword_position(params, "to")) {
            (Some(index), _) if index > from => (index, true),
            (_, Some(index)) if index > from => (index, false),
            _ => return Err(evaluation("Expected \"through\" or \"to\" in @for.")),
        };
        let Some(variable) = params[..from]
            .iter()
            .find(|node| node.is(NODE_VARIABLE))
            .and_then(Node::text)
            .map(normalize_name)
        else {
            return Err(evaluation("Expected a variable in @for."));
        };

        let (start, unit) = integer(self.eval_expression(&params[from + 1..bound])?)?;
        let (end, _) = integer(self.eval_expression(&params[bound + 1..])?)?;
        let step = if start <= end { 1 } else { -1 };
        let stop = if inclusive { end + step } else { end };

        let mut index = start;
        let mut iterations = 0usize;
        while index != stop {
            iterations += 1;
            self.check_iterations("@for", iterations)?;
            let frame = HashMap::from([(variable.clone(), SassValue::number_with_unit(index as f64, unit.clone()))]);
            if let Some(value) = self.exec_iteration(frame, rule.block, within)? {
                return Ok(Some(value));
            }
            index += step;
        }
        Ok(None)
    }

    fn exec_while(&mut self, rule: &AtRule<'_>, within: Within) -> EngineResult<Option<SassValue>> {
        let mut iterations = 0usize;
        while self.eval_expression(rule.params)?.is_truthy() {
            iterations += 1;
            self.check_iterations("@while", iterations)?;
            if let Some(value) = self.exec_iteration(HashMap::new(), rule.block, within)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn check_iterations(&self, keyword: &str, iterations: usize) -> EngineResult<()> {
        if iterations > self.options.max_loop_iterations {
            return Err(evaluation(format!(
                "{} loop exceeded {} iterations.",
                keyword, self.options.max_loop_iterations
            )));
        }
        Ok(())
    }

    fn exec_iteration(
        &mut self,
        frame: HashMap<String, SassValue>,
        block: &[Node],
        within: Within,
    ) -> EngineResult<Option<SassValue>> {
        self.current.scopes.push(Scope {
            variables: frame,
            control: true,
        });
        let result = self.exec_block(block, within);
        self.current.scopes.pop();
        result
    }

    fn define_function(&mut self, rule: &AtRule<'_>) -> EngineResult<()> {
        let (name, mut function) = UserFunction::declare(rule.params, rule.block)?;
        function.module = self.current.path.clone();
        trace!("Declared function {}()", name);
        self.current.functions.insert(name, Arc::new(function));
        Ok(())
    }

    async fn resolve(&mut self, url: &str, origin: &ImportOrigin) -> EngineResult<PathBuf> {
        self.importer
            .import(url, origin)
            .await
            .map_err(|source| EngineError::Import {
                url: url.to_string(),
                source,
            })
    }

    fn check_import_depth(&self, path: &Path) -> EngineResult<()> {
        if self.import_depth >= self.options.max_import_depth {
            return Err(EngineError::ImportDepth {
                limit: self.options.max_import_depth,
                file: path.to_path_buf(),
            });
        }
        Ok(())
    }

    async fn eval_import(&mut self, params: &[Node], origin: &ImportOrigin) -> EngineResult<()> {
        for url in import_targets(params) {
            if is_plain_css_import(&url) {
                trace!("Leaving plain CSS import {} untouched", url);
                continue;
            }

            let path = self.resolve(&url, origin).await?;
            self.check_import_depth(&path)?;
            let tree = read_stylesheet(self.parser, &path).await?;
            let nested_origin = ImportOrigin::File(path);

            // Members land in the importing stylesheet; namespaces of the imported file stay its own
            let namespaces = mem::take(&mut self.current.namespaces);
            self.import_depth += 1;
            let result = self.eval_block(tree.children(), &nested_origin).await;
            self.import_depth -= 1;
            self.current.namespaces = namespaces;
            result?;
        }
        Ok(())
    }

    async fn eval_use(&mut self, params: &[Node], origin: &ImportOrigin) -> EngineResult<()> {
        let rule = ModuleRule::parse("use", params)?;
        let namespace = rule.namespace();
        if let Some(namespace) = &namespace {
            if self.current.namespaces.named.contains_key(namespace) {
                return Err(evaluation(format!(
                    "There's already a module with namespace \"{}\".",
                    namespace
                )));
            }
        }

        if let Some(builtin) = rule.url.strip_prefix("sass:") {
            if !builtins::MODULES.contains(&builtin) {
                return Err(evaluation(format!("Can't find built-in module \"{}\".", rule.url)));
            }
            if rule.configuration.is_some() {
                return Err(evaluation("Built-in modules can't be configured."));
            }
            match namespace {
                Some(namespace) => {
                    self.current
                        .namespaces
                        .named
                        .insert(namespace, Namespace::Builtin(builtin.to_string()));
                }
                None => self.current.namespaces.flat_builtins.push(builtin.to_string()),
            }
            return Ok(());
        }

        let (path, module) = self.use_module(&rule, origin).await?;
        match namespace {
            Some(namespace) => {
                self.current.namespaces.named.insert(namespace, Namespace::Loaded(path));
            }
            None => self.merge(&module, rule.prefix()),
        }
        Ok(())
    }

    async fn eval_forward(&mut self, params: &[Node], origin: &ImportOrigin) -> EngineResult<()> {
        let rule = ModuleRule::parse("forward", params)?;
        if let Some(builtin) = rule.url.strip_prefix("sass:") {
            if !builtins::MODULES.contains(&builtin) {
                return Err(evaluation(format!("Can't find built-in module \"{}\".", rule.url)));
            }
            self.current.namespaces.flat_builtins.push(builtin.to_string());
            return Ok(());
        }

        let (_, module) = self.use_module(&rule, origin).await?;
        self.merge(&module, rule.prefix());
        Ok(())
    }

    /// Load and evaluate a module once; later uses share the result
    async fn use_module(&mut self, rule: &ModuleRule<'_>, origin: &ImportOrigin) -> EngineResult<(PathBuf, Arc<Module>)> {
        let mut configuration = HashMap::new();
        if let Some(nodes) = rule.configuration {
            for (name, expression) in configured_variables(nodes)? {
                let value = self.eval_expression(expression)?;
                configuration.insert(name, value);
            }
        }

        let path = self.resolve(&rule.url, origin).await?;
        if let Some(module) = self.modules.get(&path) {
            if !configuration.is_empty() {
                return Err(evaluation(format!(
                    "{} was already loaded, so it can't be configured using \"with\".",
                    rule.url
                )));
            }
            return Ok((path, module.clone()));
        }

        self.check_import_depth(&path)?;
        let tree = read_stylesheet(self.parser, &path).await?;
        let nested_origin = ImportOrigin::File(path.clone());
        let caller = mem::replace(&mut self.current, ModuleState::new(configuration, Some(path.clone())));
        self.import_depth += 1;
        let result = self.eval_block(tree.children(), &nested_origin).await;
        self.import_depth -= 1;
        let state = mem::replace(&mut self.current, caller);
        result?;

        let module = Arc::new(Module {
            variables: state.scopes.into_iter().next().map(|scope| scope.variables).unwrap_or_default(),
            functions: state.functions,
            namespaces: state.namespaces,
        });
        debug!(
            "Loaded module {:?} with {} variables and {} functions",
            path,
            module.variables.len(),
            module.functions.len()
        );
        self.modules.insert(path.clone(), module.clone());
        Ok((path, module))
    }

    /// Make a module's members available without a namespace
    fn merge(&mut self, module: &Module, prefix: &str) {
        let prefix = normalize_name(prefix);
        if let Some(global) = self.current.scopes.first_mut() {
            for (name, value) in &module.variables {
                global.variables.insert(format!("{}{}", prefix, name), value.clone());
            }
        }
        for (name, function) in &module.functions {
            self.current
                .functions
                .insert(format!("{}{}", prefix, name), function.clone());
        }
    }

    fn eval_declaration(&mut self, node: &Node) -> EngineResult<()> {
        let Some(property) = first_child(node, NODE_PROPERTY) else {
            return Ok(());
        };
        // Plain CSS properties only matter for CSS output, which is not produced
        let Some(name) = first_child(property, NODE_VARIABLE).and_then(Node::text) else {
            return Ok(());
        };

        let flags: Vec<&str> = node
            .children()
            .iter()
            .filter(|child| child.is(NODE_FLAG))
            .filter_map(Node::text)
            .collect();
        let is_global = flags.contains(&FLAG_GLOBAL);

        if flags.contains(&FLAG_DEFAULT)
            && self
                .lookup(name)
                .is_some_and(|value| !matches!(value, SassValue::Null))
        {
            return Ok(());
        }

        let expression = first_child(node, NODE_VALUE).map(Node::children).unwrap_or_default();
        let value = self.eval_expression(expression)?;
        self.assign(name, value, is_global);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&SassValue> {
        let key = normalize_name(name);
        self.current
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.variables.get(&key))
    }

    fn assign(&mut self, name: &str, value: SassValue, global: bool) {
        let key = normalize_name(name);
        let mut target = self.current.scopes.len().saturating_sub(1);
        if global {
            target = 0;
        } else {
            for (index, scope) in self.current.scopes.iter().enumerate().rev() {
                if scope.variables.contains_key(&key) {
                    target = index;
                    break;
                }
                if !scope.control {
                    break;
                }
            }
        }
        if let Some(scope) = self.current.scopes.get_mut(target) {
            scope.variables.insert(key, value);
        }
    }

    fn variable(&self, name: &str) -> EngineResult<SassValue> {
        if let Some(value) = self.lookup(name) {
            return Ok(value.clone());
        }
        let key = normalize_name(name);
        self.current
            .namespaces
            .flat_builtins
            .iter()
            .find_map(|module| builtins::module_variable(module, &key))
            .ok_or_else(|| EngineError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn eval_expression(&mut self, nodes: &[Node]) -> EngineResult<SassValue> {
        let items = expression_items(nodes);
        let mut cursor = Cursor::new(&items);
        let value = self.comma_list(&mut cursor)?;
        cursor.expect_end()?;
        Ok(value)
    }

    fn comma_list(&mut self, cursor: &mut Cursor<'_, '_>) -> EngineResult<SassValue> {
        let mut items = Vec::new();
        let mut saw_comma = false;

        loop {
            cursor.skip_space();
            if matches!(cursor.peek(), None | Some(Item::Colon)) {
                break;
            }
            items.push(self.space_list(cursor)?);
            cursor.skip_space();
            if matches!(cursor.peek(), Some(Item::Comma)) {
                cursor.pos += 1;
                saw_comma = true;
            } else {
                break;
            }
        }

        if !saw_comma && items.len() == 1 {
            if let Some(single) = items.pop() {
                return Ok(single);
            }
        }
        Ok(if saw_comma {
            SassValue::comma_list(items)
        } else {
            SassValue::space_list(items)
        })
    }

    fn space_list(&mut self, cursor: &mut Cursor<'_, '_>) -> EngineResult<SassValue> {
        let mut items = vec![self.binary(cursor, 0)?];

        loop {
            let start = cursor.pos;
            let had_space = cursor.skip_space();
            match cursor.peek() {
                // `foo#{$x}` and `#{$x}px` glue together into one string
                Some(Item::Atom(node)) if !had_space => {
                    cursor.pos += 1;
                    let next = self.primary(node)?;
                    if let Some(last) = items.last_mut() {
                        *last = SassValue::unquoted(format!(
                            "{}{}",
                            last.to_unquoted_text(),
                            next.to_unquoted_text()
                        ));
                    }
                }
                Some(Item::Atom(_) | Item::Member(..) | Item::Op(_)) => items.push(self.binary(cursor, 0)?),
                _ => {
                    cursor.pos = start;
                    break;
                }
            }
        }

        if items.len() == 1 {
            if let Some(single) = items.pop() {
                return Ok(single);
            }
        }
        Ok(SassValue::space_list(items))
    }

    fn binary(&mut self, cursor: &mut Cursor<'_, '_>, level: usize) -> EngineResult<SassValue> {
        let Some(operators) = PRECEDENCE.get(level) else {
            return self.unary(cursor);
        };

        let mut lhs = self.binary(cursor, level + 1)?;
        while let Some(op) = cursor.take_operator(operators) {
            let rhs = self.binary(cursor, level + 1)?;
            lhs = apply_binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self, cursor: &mut Cursor<'_, '_>) -> EngineResult<SassValue> {
        cursor.skip_space();
        let Some(item) = cursor.peek() else {
            return Err(evaluation("Expected expression."));
        };
        cursor.pos += 1;

        match item {
            Item::Op("-") => match self.unary(cursor)? {
                SassValue::Number { value, unit } => Ok(SassValue::number_with_unit(-value, unit)),
                other => Ok(SassValue::unquoted(format!("-{}", other))),
            },
            Item::Op("+") => match self.unary(cursor)? {
                number @ SassValue::Number { .. } => Ok(number),
                other => Ok(SassValue::unquoted(format!("+{}", other))),
            },
            Item::Op("not") => Ok(SassValue::Boolean(!self.unary(cursor)?.is_truthy())),
            Item::Atom(node) => self.primary(node),
            Item::Member(namespace, node) => self.member(namespace, node),
            other => Err(evaluation(format!("Expected expression, found {}.", other.describe()))),
        }
    }

    fn primary(&mut self, node: &Node) -> EngineResult<SassValue> {
        let text = node.text().unwrap_or_default();
        match node.kind.as_str() {
            NODE_NUMBER => parse_number(text),
            NODE_STRING_DOUBLE | NODE_STRING_SINGLE => Ok(SassValue::quoted(unescape(text))),
            NODE_IDENTIFIER => Ok(keyword_value(text)),
            NODE_COLOR_HEX => Ok(Color::from_hex(text)
                .map(SassValue::Color)
                .unwrap_or_else(|| SassValue::unquoted(format!("#{}", text)))),
            NODE_VARIABLE => self.variable(text),
            NODE_FUNCTION => self.call_function(node),
            NODE_PARENTHESES => self.parenthesized(node.children()),
            NODE_INTERPOLATION => {
                let value = self.eval_expression(node.children())?;
                Ok(SassValue::unquoted(value.to_unquoted_text()))
            }
            NODE_VALUE => self.eval_expression(node.children()),
            _ => Ok(SassValue::unquoted(stringify(node))),
        }
    }

    fn parenthesized(&mut self, nodes: &[Node]) -> EngineResult<SassValue> {
        let items = expression_items(nodes);
        let mut cursor = Cursor::new(&items);

        if !items.iter().any(|item| matches!(item, Item::Colon)) {
            let value = self.comma_list(&mut cursor)?;
            cursor.expect_end()?;
            return Ok(value);
        }

        let mut pairs: Vec<(SassValue, SassValue)> = Vec::new();
        loop {
            cursor.skip_space();
            if cursor.peek().is_none() {
                break;
            }
            let key = self.space_list(&mut cursor)?;
            cursor.skip_space();
            if !matches!(cursor.peek(), Some(Item::Colon)) {
                return Err(evaluation("Expected \":\" in map."));
            }
            cursor.pos += 1;
            let value = self.space_list(&mut cursor)?;
            if pairs.iter().any(|(existing, _)| existing.sass_eq(&key)) {
                return Err(evaluation(format!("Duplicate key {} in map.", key)));
            }
            pairs.push((key, value));

            cursor.skip_space();
            if matches!(cursor.peek(), Some(Item::Comma)) {
                cursor.pos += 1;
            } else {
                break;
            }
        }
        cursor.expect_end()?;
        Ok(SassValue::Map(pairs))
    }

    /// `namespace.$variable` or `namespace.function(...)`
    fn member(&mut self, namespace: &str, node: &Node) -> EngineResult<SassValue> {
        let qualified = |name: &str| format!("{}.{}", namespace, name);
        let Some(target) = self.current.namespaces.get(namespace).cloned() else {
            return Err(evaluation(format!(
                "There is no module with the namespace \"{}\".",
                namespace
            )));
        };

        if node.is(NODE_VARIABLE) {
            let name = node.text().unwrap_or_default();
            let key = normalize_name(name);
            let value = match &target {
                Namespace::Builtin(module) => builtins::module_variable(module, &key),
                Namespace::Loaded(path) => self
                    .modules
                    .get(path)
                    .and_then(|module| module.variables.get(&key))
                    .cloned(),
            };
            return value.ok_or_else(|| EngineError::UndefinedVariable { name: qualified(name) });
        }

        let children = node.children();
        let name = children.first().and_then(Node::text).unwrap_or_default();
        let arguments = children.get(1).map(Node::children).unwrap_or_default();
        let key = normalize_name(name);
        let undefined = || EngineError::Function {
            name: qualified(name),
            message: "undefined function".to_string(),
        };

        match target {
            Namespace::Builtin(module) => {
                let args = self.eval_arguments(arguments)?.into_positional(&qualified(name))?;
                builtins::call_in_module(&module, &key, &args).unwrap_or_else(|| Err(undefined()))
            }
            Namespace::Loaded(path) => {
                let function = self
                    .modules
                    .get(&path)
                    .and_then(|module| module.functions.get(&key))
                    .cloned()
                    .ok_or_else(undefined)?;
                let args = self.eval_arguments(arguments)?;
                self.call_user_function(&qualified(name), &function, args)
            }
        }
    }

    fn call_function(&mut self, node: &Node) -> EngineResult<SassValue> {
        let children = node.children();
        let name = children.first().and_then(Node::text).unwrap_or_default();
        let arguments = children.get(1).map(Node::children).unwrap_or_default();
        let key = normalize_name(name);

        if self.functions.contains(name) {
            let args = self.eval_arguments(arguments)?.into_positional(name)?;
            if let Some(result) = self.functions.call(name, &args) {
                return result.map_err(|message| EngineError::Function {
                    name: name.to_string(),
                    message,
                });
            }
        }

        if let Some(function) = self.current.functions.get(&key).cloned() {
            let args = self.eval_arguments(arguments)?;
            return self.call_user_function(name, &function, args);
        }

        if RAW_CSS_FUNCTIONS.contains(&name.to_ascii_lowercase().as_str()) {
            return Ok(SassValue::unquoted(stringify(node)));
        }

        let args = self.eval_arguments(arguments)?.into_positional(name)?;

        if let Some(result) = self.meta_function(&key, &args) {
            return result;
        }
        if let Some(result) = builtins::call(&key, &args) {
            return result;
        }
        for module in &self.current.namespaces.flat_builtins {
            if let Some(result) = builtins::call_in_module(module, &key, &args) {
                return result;
            }
        }

        let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
        Ok(SassValue::unquoted(format!("{}({})", name, rendered.join(", "))))
    }

    /// Built-ins that inspect the evaluator's own state
    fn meta_function(&self, name: &str, args: &[SassValue]) -> Option<EngineResult<SassValue>> {
        let exists: fn(&Self, &str) -> bool = match name {
            "variable-exists" => |render: &Self, variable: &str| render.lookup(variable).is_some(),
            "global-variable-exists" => |render: &Self, variable: &str| {
                render
                    .current
                    .scopes
                    .first()
                    .is_some_and(|scope| scope.variables.contains_key(&normalize_name(variable)))
            },
            _ => return None,
        };
        Some(match args {
            [variable] => Ok(SassValue::Boolean(exists(self, &variable.to_unquoted_text()))),
            _ => Err(EngineError::Function {
                name: name.to_string(),
                message: format!("expected 1 arguments, got {}", args.len()),
            }),
        })
    }

    fn call_user_function(
        &mut self,
        name: &str,
        function: &UserFunction,
        args: Arguments,
    ) -> EngineResult<SassValue> {
        if self.call_depth >= self.options.max_call_depth {
            return Err(EngineError::Function {
                name: name.to_string(),
                message: format!("call depth limit of {} exceeded", self.options.max_call_depth),
            });
        }

        // Function bodies see their own module's globals, never the caller's locals
        let caller = match &function.module {
            Some(path) if self.current.path.as_ref() != Some(path) => {
                let Some(module) = self.modules.get(path).cloned() else {
                    return Err(EngineError::Function {
                        name: name.to_string(),
                        message: format!("module {:?} is not loaded", path),
                    });
                };
                Caller::Module(mem::replace(&mut self.current, ModuleState::of(&module, path.clone())))
            }
            _ => Caller::Scopes(self.current.scopes.split_off(1)),
        };

        self.current.scopes.push(Scope::default());
        self.call_depth += 1;
        let result = self
            .bind_arguments(name, function, args)
            .and_then(|()| self.exec_block(&function.body, Within::Function));
        self.call_depth -= 1;

        match caller {
            Caller::Scopes(locals) => {
                self.current.scopes.truncate(1);
                self.current.scopes.extend(locals);
            }
            Caller::Module(state) => self.current = state,
        }

        result?.ok_or_else(|| EngineError::Function {
            name: name.to_string(),
            message: "function finished without @return".to_string(),
        })
    }

    /// Bind arguments to parameters in the function's frame. Defaults are
    /// evaluated after the parameters before them are bound.
    fn bind_arguments(&mut self, name: &str, function: &UserFunction, args: Arguments) -> EngineResult<()> {
        let error = |message: String| EngineError::Function {
            name: name.to_string(),
            message,
        };
        let Arguments { positional, mut named } = args;
        let mut positional = positional.into_iter();

        for parameter in &function.parameters {
            let key = normalize_name(&parameter.name);
            let value = if parameter.rest {
                SassValue::comma_list(positional.by_ref().collect())
            } else if let Some(value) = positional.next() {
                value
            } else if let Some(index) = named.iter().position(|(keyword, _)| *keyword == key) {
                named.remove(index).1
            } else if let Some(default) = &parameter.default {
                self.eval_expression(default)?
            } else {
                return Err(error(format!("missing argument ${}", parameter.name)));
            };
            self.assign(&key, value, false);
        }

        if positional.next().is_some() {
            return Err(error(format!(
                "only {} arguments allowed",
                function.parameters.len()
            )));
        }
        if let Some((keyword, _)) = named.first() {
            return Err(error(format!("no parameter named ${}", keyword)));
        }
        Ok(())
    }

    fn eval_arguments(&mut self, nodes: &[Node]) -> EngineResult<Arguments> {
        let items = expression_items(nodes);
        let mut cursor = Cursor::new(&items);
        let mut args = Arguments::default();

        loop {
            cursor.skip_space();
            let Some(first) = cursor.peek() else {
                break;
            };

            match keyword_argument(&mut cursor, first) {
                Some(keyword) => {
                    let value = self.space_list(&mut cursor)?;
                    args.named.push((normalize_name(keyword), value));
                }
                None if !args.named.is_empty() => {
                    return Err(evaluation("Positional arguments must come before keyword arguments."));
                }
                None => args.positional.push(self.space_list(&mut cursor)?),
            }

            cursor.skip_space();
            match cursor.peek() {
                None => break,
                Some(Item::Comma) => cursor.pos += 1,
                Some(other) => {
                    return Err(evaluation(format!(
                        "Expected \",\" or \")\", found {}.",
                        other.describe()
                    )));
                }
            }
        }
        Ok(args)
    }
}

async fn read_stylesheet(parser: &ScssParser, path: &Path) -> EngineResult<Node> {
    trace!("Loading {:?}", path);
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| EngineError::Io {
            file: path.to_path_buf(),
            source,
        })?;
    parser
        .parse(&content)
        .map_err(|source| EngineError::ImportParse {
            file: path.to_path_buf(),
            source,
        })
}

/// Consume `$name:` when the cursor is at a keyword argument
fn keyword_argument<'n>(cursor: &mut Cursor<'_, 'n>, first: Item<'n>) -> Option<&'n str> {
    let Item::Atom(node) = first else {
        return None;
    };
    if !node.is(NODE_VARIABLE) {
        return None;
    }
    let start = cursor.pos;
    cursor.pos += 1;
    cursor.skip_space();
    if matches!(cursor.peek(), Some(Item::Colon)) {
        cursor.pos += 1;
        return node.text();
    }
    cursor.pos = start;
    None
}

fn evaluation(message: impl Into<String>) -> EngineError {
    EngineError::Evaluation {
        message: message.into(),
    }
}

/// Index of a bare keyword such as `in`, `from` or `through` among at-rule parameters
fn keyword_position(params: &[Node], keyword: &str) -> Option<usize> {
    params
        .iter()
        .position(|node| node.is(NODE_IDENTIFIER) && node.text() == Some(keyword))
}

fn integer(value: SassValue) -> EngineResult<(i64, Option<String>)> {
    match value {
        SassValue::Number { value, unit } if value.fract() == 0.0 => Ok((value as i64, unit)),
        other => Err(evaluation(format!("{} is not an integer.", other))),
    }
}

fn apply_binary(op: &str, lhs: SassValue, rhs: SassValue) -> EngineResult<SassValue> {
    match op {
        "or" => Ok(if lhs.is_truthy() { lhs } else { rhs }),
        "and" => Ok(if lhs.is_truthy() { rhs } else { lhs }),
        "==" => Ok(SassValue::Boolean(lhs.sass_eq(&rhs))),
        "!=" => Ok(SassValue::Boolean(!lhs.sass_eq(&rhs))),
        "<" | "<=" | ">" | ">=" => lhs.compare(&rhs, op).map(SassValue::Boolean),
        "+" => lhs.add(&rhs),
        "-" => lhs.sub(&rhs),
        "*" => lhs.mul(&rhs),
        "/" => lhs.div(&rhs),
        _ => lhs.rem(&rhs),
    }
}

/// One element of an expression after trivia is classified
#[derive(Debug, Clone, Copy)]
enum Item<'n> {
    Space,
    Comma,
    Colon,
    Op(&'n str),
    Atom(&'n Node),
    /// `namespace.$variable` or `namespace.function(...)`
    Member(&'n str, &'n Node),
}

impl Item<'_> {
    fn describe(&self) -> String {
        match self {
            Item::Space => "whitespace".to_string(),
            Item::Comma => "\",\"".to_string(),
            Item::Colon => "\":\"".to_string(),
            Item::Op(op) => format!("\"{}\"", op),
            Item::Atom(node) => format!("\"{}\"", stringify(node)),
            Item::Member(namespace, node) => format!("\"{}.{}\"", namespace, stringify(node)),
        }
    }
}

fn expression_items(nodes: &[Node]) -> Vec<Item<'_>> {
    let mut items = Vec::with_capacity(nodes.len());
    let mut index = 0;

    while let Some(node) = nodes.get(index) {
        index += 1;
        let text = node.text().unwrap_or_default();
        let item = match node.kind.as_str() {
            NODE_COMMENT_SINGLELINE | NODE_COMMENT_MULTILINE => continue,
            NODE_SPACE => Item::Space,
            NODE_PUNCTUATION if text == "," => Item::Comma,
            NODE_PUNCTUATION if text == ":" => Item::Colon,
            NODE_OPERATOR => Item::Op(text),
            NODE_IDENTIFIER if matches!(text, "and" | "or" | "not") => Item::Op(text),
            NODE_IDENTIFIER => match (nodes.get(index), nodes.get(index + 1)) {
                (Some(dot), Some(member))
                    if dot.is(NODE_PUNCTUATION)
                        && dot.text() == Some(".")
                        && (member.is(NODE_VARIABLE) || member.is(NODE_FUNCTION)) =>
                {
                    index += 2;
                    Item::Member(text, member)
                }
                _ => Item::Atom(node),
            },
            _ => Item::Atom(node),
        };
        items.push(item);
    }
    items
}

struct Cursor<'i, 'n> {
    items: &'i [Item<'n>],
    pos: usize,
}

impl<'i, 'n> Cursor<'i, 'n> {
    fn new(items: &'i [Item<'n>]) -> Self {
        Self { items, pos: 0 }
    }

    fn peek(&self) -> Option<Item<'n>> {
        self.items.get(self.pos).copied()
    }

    /// Skip whitespace; reports whether any was skipped
    fn skip_space(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(Item::Space)) {
            self.pos += 1;
        }
        self.pos > start
    }

    /// Consume a binary operator from `operators`, with the whitespace around it
    fn take_operator(&mut self, operators: &[&str]) -> Option<&'n str> {
        let start = self.pos;
        let space_before = self.skip_space();

        if let Some(Item::Op(op)) = self.peek() {
            // `1 -2` is a list of two numbers, not a subtraction
            let space_after = matches!(self.items.get(self.pos + 1), Some(Item::Space));
            let unary = matches!(op, "-" | "+") && space_before && !space_after;
            if operators.contains(&op) && !unary {
                self.pos += 1;
                self.skip_space();
                return Some(op);
            }
        }

        self.pos = start;
        None
    }

    fn expect_end(&mut self) -> EngineResult<()> {
        self.skip_space();
        match self.peek() {
            None => Ok(()),
            Some(item) => Err(EngineError::Evaluation {
                message: format!("Unexpected {} in expression.", item.describe()),
            }),
        }
    }
}

/// Parameters of an at-rule: everything between the keyword and its block or `;`
fn at_rule_params(children: &[Node]) -> &[Node] {
    let params = children.get(1..).unwrap_or_default();
    match params.split_last() {
        Some((last, rest))
            if last.is(NODE_BLOCK) || (last.is(NODE_PUNCTUATION) && last.text() == Some(";")) =>
        {
            rest
        }
        _ => params,
    }
}

/// For `@else if <condition>` the condition nodes; `None` for a plain `@else`
fn else_if_condition(params: &[Node]) -> Option<&[Node]> {
    let start = params.iter().position(|node| !node.is(NODE_SPACE))?;
    let first = &params[start];
    (first.is(NODE_IDENTIFIER) && first.text() == Some("if")).then(|| &params[start + 1..])
}

/// URLs named by an import rule; anything after the first identifier (`as`, `with`) is ignored
fn import_targets(params: &[Node]) -> Vec<String> {
    let mut targets = Vec::new();
    for node in params {
        match node.kind.as_str() {
            NODE_STRING_DOUBLE | NODE_STRING_SINGLE => {
                targets.push(unescape(node.text().unwrap_or_default()));
            }
            NODE_FUNCTION => targets.push(stringify(node)),
            NODE_IDENTIFIER => break,
            _ => {}
        }
    }
    targets
}

/// Imports Sass leaves as plain CSS `@import` rules
fn is_plain_css_import(url: &str) -> bool {
    url.starts_with("url(")
        || url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with("//")
        || url.ends_with(".css")
}

fn parse_number(text: &str) -> EngineResult<SassValue> {
    let bytes = text.as_bytes();
    let mut split = bytes
        .iter()
        .position(|byte| !(byte.is_ascii_digit() || *byte == b'.'))
        .unwrap_or(bytes.len());
    // `1e3` and `2.5E-2` carry an exponent; `1em` carries a unit
    if matches!(bytes.get(split), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(split + 1), Some(b'+' | b'-')));
        let digits = bytes[split + 1 + sign..]
            .iter()
            .take_while(|byte| byte.is_ascii_digit())
            .count();
        if digits > 0 {
            split += 1 + sign + digits;
        }
    }
    let (digits, unit) = text.split_at(split);
    let value: f64 = digits.parse().map_err(|_| EngineError::Evaluation {
        message: format!("Invalid number \"{}\".", text),
    })?;
    let unit = (!unit.is_empty()).then(|| unit.to_string());
    Ok(SassValue::number_with_unit(value, unit))
}

fn keyword_value(text: &str) -> SassValue {
    match text {
        "true" => SassValue::Boolean(true),
        "false" => SassValue::Boolean(false),
        "null" => SassValue::Null,
        _ => Color::from_keyword(text)
            .map(SassValue::Color)
            .unwrap_or_else(|| SassValue::unquoted(text)),
    }
}

pub(super) fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod tests;
