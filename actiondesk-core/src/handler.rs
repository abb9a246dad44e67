//! Per-request dispatcher of action expressions.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_recursion::async_recursion;
use async_trait::async_trait;
use tracing::{debug, error, instrument, trace};

use crate::action::ActionGroup;
use crate::context::{ActionContext, ActionRequest, Bindings};
use crate::controller::{ControllerError, ControllerObject};
use crate::error::{EvalError, EvalResult};
use crate::expression::{CallTarget, Expression, ExpressionKind, MethodInvocation, make_method_call};
use crate::format::FieldFormatter;
use crate::query::{QueryError, QueryHandle, QueryOutcome, QueryResult, normalize_select};
use crate::response::{ActionResponse, ActionResult};
use crate::script::{ScriptError, ScriptHost, ScriptResult};
use crate::services::ActionServices;
use crate::template::{TemplateHost, TemplateKind, preprocess};
use crate::value::{QueryValue, Value};

/// Name under which scripts reach the handler itself.
pub const HANDLER_BINDING: &str = "__me__";

/// Evaluates action expressions for one request.
///
/// A handler is built per request from the shared [`ActionServices`] and consumed
/// by [`ActionHandler::execute`].
pub struct ActionHandler {
    services: Arc<ActionServices>,
    request: ActionRequest,
    context: ActionContext,
    bindings: Bindings,
}

impl ActionHandler {
    pub fn for_request(services: Arc<ActionServices>, request: ActionRequest) -> Self {
        let context = ActionContext::from_request(&request);
        let bindings = Bindings::from_context(&context);
        Self {
            services,
            request,
            context,
            bindings,
        }
    }

    pub fn request(&self) -> &ActionRequest {
        &self.request
    }

    pub fn context(&self) -> &ActionContext {
        &self.context
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn services(&self) -> &Arc<ActionServices> {
        &self.services
    }

    /// Evaluates a prefixed action expression.
    #[instrument(level = "debug", skip(self))]
    pub async fn evaluate(&self, expression: &str) -> EvalResult<ActionResult> {
        self.evaluate_at(expression, 0).await
    }

    /// Evaluates `expression` as part of a chain `depth` actions deep.
    #[async_recursion]
    pub async fn evaluate_at(&self, expression: &str, depth: usize) -> EvalResult<ActionResult> {
        if expression.is_empty() {
            return Ok(ActionResult::null());
        }

        let expression = Expression::parse(expression);
        let body = expression.body();
        debug!("dispatch {}: {}", expression.kind(), body);

        match expression.kind() {
            ExpressionKind::Literal => Ok(Value::String(body.to_string()).into()),
            ExpressionKind::Eval => Ok(self.eval_script(body, depth).await?.into()),
            ExpressionKind::Action => self.handle_action(body, depth + 1).await,
            ExpressionKind::Call => self.handle_call(body).await,
            ExpressionKind::SelectOne => {
                let script = make_method_call(&format!("{}.selectOne", HANDLER_BINDING), body);
                Ok(self.eval_script(&script, depth).await?.into())
            }
            ExpressionKind::SelectAll => {
                let script = make_method_call(&format!("{}.selectAll", HANDLER_BINDING), body);
                Ok(self.eval_script(&script, depth).await?.into())
            }
        }
    }

    /// Resolves and evaluates a named action.
    #[async_recursion]
    pub async fn handle_action(&self, name: &str, depth: usize) -> EvalResult<ActionResult> {
        let name = name.trim();
        if depth > self.services.config.max_action_depth {
            error!("action nesting too deep at {}: {}", name, depth);
            return Err(EvalError::CyclicAction {
                name: name.to_string(),
                depth,
            });
        }

        let Some(definition) = self.services.actions.lookup(name) else {
            debug!("no such action found: {}", name);
            return Ok(ActionResult::null());
        };
        trace!("evaluate action {} at depth {}", name, depth);
        definition.evaluate(self, depth).await
    }

    async fn handle_call(&self, body: &str) -> EvalResult<ActionResult> {
        let body = body.trim();
        if body.is_empty() {
            return Ok(ActionResult::null());
        }
        let Some(target) = CallTarget::parse(body) else {
            error!("invalid call expression: {}", body);
            return Ok(ActionResult::null());
        };
        Ok(self.call(&target.controller, &target.method).await.into())
    }

    /// Invokes `controller.method` with the current request. Failures are
    /// recorded on the returned response.
    pub async fn call(&self, controller: &str, method: &str) -> ActionResponse {
        let mut response = ActionResponse::new();
        let Some(target) = self.services.controllers.get(controller) else {
            let err = ControllerError::NotFound(controller.to_string());
            error!("{}", err);
            response.set_exception(err.kind(), err.to_string());
            return response;
        };
        if let Err(err) = target.handle(method, &self.request, &mut response).await {
            error!("call {}:{} failed: {}", controller, method, err);
            response.set_exception(err.kind(), err.to_string());
        }
        response
    }

    /// Calls `method_call` (`name(args)`) on a controller, arguments evaluated as
    /// script against the bindings. Text that is not a call yields null.
    pub async fn rpc(&self, controller: &str, method_call: &str) -> EvalResult<Value> {
        let Some(invocation) = MethodInvocation::parse(method_call) else {
            debug!("not a method call: {}", method_call);
            return Ok(Value::Null);
        };
        let target = self.services.controllers.get(controller).ok_or_else(|| {
            EvalError::Invocation(ControllerError::NotFound(controller.to_string()).to_string())
        })?;
        debug!("rpc {}.{}({})", controller, invocation.method, invocation.arguments);

        let object = ControllerObject::new(target);
        let host = self.host(0);
        self.services
            .script
            .call(&object, method_call.trim(), &self.bindings, &host)
            .await
            .map_err(|e| EvalError::Invocation(e.to_string()))
    }

    /// Single row of `query`; no row yields null.
    pub async fn select_one(&self, query: &str, params: &[Value]) -> EvalResult<Value> {
        check_query(query)?;
        let handle = self.prepare_select(query, params)?;
        match handle.single_result().await {
            Ok(value) => Ok(value),
            Err(QueryError::NoResult) => Ok(Value::Null),
            Err(err) => Err(err.into()),
        }
    }

    /// All rows of `query`; any execution failure yields null.
    pub async fn select_all(&self, query: &str, params: &[Value]) -> EvalResult<Value> {
        check_query(query)?;
        let result = match self.prepare_select(query, params) {
            Ok(handle) => handle.result_list().await,
            Err(err) => Err(err),
        };
        Ok(match QueryOutcome::capture(result) {
            QueryOutcome::Rows(rows) => Value::List(rows),
            QueryOutcome::NoResult => Value::Null,
            QueryOutcome::Ignored(err) => {
                debug!("select[] failed: {}: {}", query, err);
                Value::Null
            }
        })
    }

    /// First `model` record matching `filter`. Named parameters come from the
    /// bindings overlaid with `params`.
    pub async fn search(
        &self,
        model: &str,
        filter: &str,
        params: &BTreeMap<String, Value>,
    ) -> EvalResult<Value> {
        self.search_at(model, filter, params, 0).await
    }

    async fn search_at(
        &self,
        model: &str,
        filter: &str,
        params: &BTreeMap<String, Value>,
        depth: usize,
    ) -> EvalResult<Value> {
        let script = format!("{}.all().{}", model, make_method_call("filter", filter));
        let query = match self.eval_script(&script, depth).await? {
            Value::Query(query) => query,
            other => {
                return Err(EvalError::Invocation(format!(
                    "search produced {} instead of a query: {}",
                    other.type_name(),
                    script
                )));
            }
        };

        let scope = self.bindings.clone();
        for (name, value) in params {
            scope.insert(name.clone(), value.clone());
        }
        let mut handle = self.services.queries.from_value(&query)?;
        handle.bind(&scope, &query.params);
        match handle.single_result().await {
            Ok(value) => Ok(value),
            Err(QueryError::NoResult) => Ok(Value::Null),
            Err(err) => Err(err.into()),
        }
    }

    /// Renders `template` against a snapshot of the bindings. Blank templates
    /// render as an empty string.
    #[instrument(level = "debug", skip(self, template))]
    pub async fn render_template(&self, kind: TemplateKind, template: &str) -> EvalResult<String> {
        if template.trim().is_empty() {
            return Ok(String::new());
        }
        let text = match kind {
            TemplateKind::Script => preprocess(template, &self.services.config.template),
            TemplateKind::Plain => template.to_string(),
        };

        let scope = self.bindings.clone();
        let formatter = FieldFormatter::new(
            self.context.model(),
            &scope,
            self.services.mapper.as_ref(),
            self.services.selections.as_ref(),
        );
        let inner = self.host(0);
        let host = TemplateHost::new(formatter, &inner);
        Ok(self.services.templates.render(&text, &scope, &host).await?)
    }

    /// Runs the comma separated actions of the request.
    ///
    /// The first action answering with a response decides the result; otherwise
    /// the collected values become the data of a success response. Evaluation
    /// errors are reported as a failure response.
    #[instrument(level = "debug", skip(self))]
    pub async fn execute(self) -> EvalResult<ActionResponse> {
        let Some(names) = self.request.action.as_deref() else {
            return Err(EvalError::MissingAction);
        };
        let group = ActionGroup::parse(names);

        match group.evaluate(&self, 0).await {
            Ok(ActionResult::Response(response)) => Ok(response),
            Ok(ActionResult::Value(data)) => Ok(ActionResponse::success(data)),
            Err(err) => {
                error!("action {} failed: {}", names, err);
                let mut response = ActionResponse::new();
                response.set_exception(err.kind(), err.to_string());
                Ok(response)
            }
        }
    }

    async fn eval_script(&self, text: &str, depth: usize) -> EvalResult<Value> {
        let host = self.host(depth);
        Ok(self.services.script.eval(text, &self.bindings, &host).await?)
    }

    fn prepare_select(&self, query: &str, params: &[Value]) -> QueryResult<Box<dyn QueryHandle>> {
        let mut handle = self.services.queries.create_query(&normalize_select(query))?;
        handle.bind(&self.bindings, params);
        Ok(handle)
    }

    fn host(&self, depth: usize) -> HandlerHost<'_> {
        HandlerHost {
            handler: self,
            depth,
        }
    }
}

fn check_query(query: &str) -> EvalResult<()> {
    if query.trim().is_empty() {
        return Err(EvalError::EmptyQuery);
    }
    Ok(())
}

/// Script-side view of a handler: `__me__` calls, `Model.all()` and query filters.
struct HandlerHost<'a> {
    handler: &'a ActionHandler,
    depth: usize,
}

impl HandlerHost<'_> {
    async fn invoke_handler(&self, method: &str, args: Vec<Value>) -> EvalResult<Value> {
        let handler = self.handler;
        match (method, args.as_slice()) {
            ("selectOne", [Value::String(query), params @ ..]) => {
                handler.select_one(query, params).await
            }
            ("selectAll", [Value::String(query), params @ ..]) => {
                handler.select_all(query, params).await
            }
            ("search", [Value::String(model), Value::String(filter)]) => {
                handler
                    .search_at(model, filter, &BTreeMap::new(), self.depth)
                    .await
            }
            ("search", [Value::String(model), Value::String(filter), Value::Map(params)]) => {
                handler.search_at(model, filter, params, self.depth).await
            }
            ("evaluate", [Value::String(expression)]) => {
                match handler.evaluate_at(expression, self.depth + 1).await? {
                    ActionResult::Value(value) => Ok(value),
                    ActionResult::Response(response) => serde_json::to_value(&response)
                        .map(Value::from)
                        .map_err(|e| {
                            error!("cannot convert response of {}: {}", expression, e);
                            EvalError::Invocation(e.to_string())
                        }),
                }
            }
            _ => Err(ScriptError::UnknownMethod {
                target: HANDLER_BINDING.to_string(),
                method: method.to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl ScriptHost for HandlerHost<'_> {
    async fn invoke_static(
        &self,
        target: &str,
        method: &str,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        if target == HANDLER_BINDING {
            return self
                .invoke_handler(method, args)
                .await
                .map_err(|e| match e {
                    EvalError::Script(err) => err,
                    EvalError::CyclicAction { name, depth } => {
                        ScriptError::CyclicAction { name, depth }
                    }
                    err => ScriptError::Host(err.to_string()),
                });
        }
        match (method, args.as_slice()) {
            ("all", []) => Ok(Value::Query(QueryValue::all(target))),
            _ => Err(ScriptError::UnknownMethod {
                target: target.to_string(),
                method: method.to_string(),
            }),
        }
    }

    async fn invoke_method(
        &self,
        receiver: &Value,
        method: &str,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        match (receiver, method, args.as_slice()) {
            (Value::Query(query), "filter", [Value::String(filter), params @ ..]) => {
                Ok(Value::Query(QueryValue {
                    model: query.model.clone(),
                    filter: Some(filter.clone()),
                    params: params.to_vec(),
                }))
            }
            _ => Err(ScriptError::UnknownMethod {
                target: receiver.type_name().to_string(),
                method: method.to_string(),
            }),
        }
    }
}
