//! Meta handler dispatch
//!
//! A [`MetaHandler`] is what a feature handler is built on: a name, the
//! variables it defines, and an ordered list of mutators. It answers
//! DiscoverVariables, GeneratePatches, and ValidateTopology uniformly.
//!
//! Each mutator declares the [`VariableRef`] it reads. The builder checks every
//! declared field path against the schema advertised for its variable, so a
//! handler that would look for a field DiscoverVariables never advertised is
//! rejected at startup.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use trellis_common::hooks::{
    ClusterClassVariable, DiscoverVariablesRequest, DiscoverVariablesResponse,
    GeneratePatchesRequest, GeneratePatchesRequestItem, GeneratePatchesResponse,
    GeneratePatchesResponseItem, Hook, HookResponse, PatchSelector, ValidateTopologyRequest,
    VariableSchema,
};
use trellis_common::schema::{schema_for, JsonSchemaProps};
use trellis_common::{Error, Result};

use crate::mutation::{self, MutationContext, PatchSet};
use crate::objects::{ObjectRegistry, TemplateKind, TemplateType};
use crate::variables::{merge_variable_maps, variable_map, VariableMap, VariableRef};

// =============================================================================
// Variable definitions
// =============================================================================

/// A variable a handler defines, with its advertised schema
#[derive(Clone, Debug, PartialEq)]
pub struct VariableDefinition {
    /// Variable name
    pub name: String,
    /// Whether every Cluster must set it
    pub required: bool,
    /// OpenAPI v3 schema advertised to CAPI
    pub schema: JsonSchemaProps,
}

impl VariableDefinition {
    /// Define a variable whose value has the shape of `T`
    pub fn of<T: JsonSchema>(name: &str, required: bool) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            required,
            schema: schema_for::<T>(name)?,
        })
    }

    /// Wire form for a DiscoverVariables response
    pub fn to_cluster_class_variable(&self) -> ClusterClassVariable {
        ClusterClassVariable {
            name: self.name.clone(),
            required: self.required,
            schema: VariableSchema {
                open_api_v3_schema: self.schema.clone(),
            },
        }
    }
}

// =============================================================================
// Mutators
// =============================================================================

/// One `(variable, selector, mutate fn)` unit of a meta handler
pub trait Mutate: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// The variable and field path this mutator reads
    fn variable(&self) -> VariableRef;

    /// Which objects this mutator applies to
    fn selector(&self) -> &PatchSelector;

    /// Template kind the mutate fn operates on
    fn template_kind(&self) -> TemplateKind;

    /// Resolve the variable, returning whether it is set
    ///
    /// Fails when the value does not have the expected type.
    fn lookup(&self, variables: &VariableMap) -> Result<bool>;

    /// Resolve the variable and, if set, mutate the item and merge its patch
    fn generate(
        &self,
        registry: &ObjectRegistry,
        item: &GeneratePatchesRequestItem,
        variables: &VariableMap,
        patches: &mut PatchSet,
    ) -> Result<()>;
}

type MutateFn<V, T> = dyn Fn(&V, &mut T, &MutationContext<'_>) -> Result<()> + Send + Sync;

/// A mutator reading a `V` and mutating a `T`
///
/// When the variable is unset the mutator is skipped, unless
/// [`TypedMutator::or_default`] was used, in which case the mutate fn runs
/// with `V::default()`.
pub struct TypedMutator<V, T> {
    name: String,
    variable: VariableRef,
    selector: PatchSelector,
    default: Option<V>,
    mutate: Box<MutateFn<V, T>>,
    _template: PhantomData<fn() -> T>,
}

impl<V, T> TypedMutator<V, T>
where
    V: DeserializeOwned + Send + Sync + 'static,
    T: TemplateType,
{
    /// Create a mutator
    pub fn new<F>(
        name: impl Into<String>,
        variable: VariableRef,
        selector: PatchSelector,
        mutate: F,
    ) -> Self
    where
        F: Fn(&V, &mut T, &MutationContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            variable,
            selector,
            default: None,
            mutate: Box::new(mutate),
            _template: PhantomData,
        }
    }

    /// Run the mutate fn with `V::default()` when the variable is unset
    pub fn or_default(mut self) -> Self
    where
        V: Default,
    {
        self.default = Some(V::default());
        self
    }
}

impl<V, T> Mutate for TypedMutator<V, T>
where
    V: DeserializeOwned + Send + Sync + 'static,
    T: TemplateType,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn variable(&self) -> VariableRef {
        self.variable
    }

    fn selector(&self) -> &PatchSelector {
        &self.selector
    }

    fn template_kind(&self) -> TemplateKind {
        T::KIND
    }

    fn lookup(&self, variables: &VariableMap) -> Result<bool> {
        Ok(self.variable.get::<V>(variables)?.is_some())
    }

    fn generate(
        &self,
        registry: &ObjectRegistry,
        item: &GeneratePatchesRequestItem,
        variables: &VariableMap,
        patches: &mut PatchSet,
    ) -> Result<()> {
        let resolved = self.variable.get::<V>(variables)?;
        let value = match (&resolved, &self.default) {
            (Some(value), _) => value,
            (None, Some(default)) => default,
            (None, None) => {
                trace!(
                    mutator = %self.name,
                    variable = %self.variable,
                    "variable not set, skipping"
                );
                return Ok(());
            }
        };

        let ctx = MutationContext {
            variables,
            holder: &item.holder_reference,
        };
        mutation::generate::<T, _>(
            registry,
            &self.name,
            item,
            variables,
            &self.selector,
            patches,
            |object| (self.mutate)(value, object, &ctx),
        )
    }
}

impl<V, T: TemplateType> fmt::Debug for TypedMutator<V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedMutator")
            .field("name", &self.name)
            .field("variable", &self.variable.to_string())
            .field("kind", &T::KIND.kind_str())
            .finish()
    }
}

// =============================================================================
// Meta handler
// =============================================================================

/// A named group of variable definitions and mutators serving the patch hooks
pub struct MetaHandler {
    name: String,
    variables: Vec<VariableDefinition>,
    mutators: Vec<Box<dyn Mutate>>,
    registry: Arc<ObjectRegistry>,
}

impl fmt::Debug for MetaHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mutators: Vec<_> = self.mutators.iter().map(|m| m.name()).collect();
        f.debug_struct("MetaHandler")
            .field("name", &self.name)
            .field("variables", &self.variables.iter().map(|v| &v.name).collect::<Vec<_>>())
            .field("mutators", &mutators)
            .finish()
    }
}

/// Builder for [`MetaHandler`]
pub struct MetaHandlerBuilder {
    name: String,
    variables: Vec<VariableDefinition>,
    mutators: Vec<Box<dyn Mutate>>,
}

impl MetaHandlerBuilder {
    /// Add a variable definition
    pub fn variable(mut self, definition: VariableDefinition) -> Self {
        self.variables.push(definition);
        self
    }

    /// Append a mutator; mutators run in the order they are added
    pub fn mutator(mut self, mutator: impl Mutate + 'static) -> Self {
        self.mutators.push(Box::new(mutator));
        self
    }

    /// Append already boxed mutators
    pub fn mutators(mut self, mutators: impl IntoIterator<Item = Box<dyn Mutate>>) -> Self {
        self.mutators.extend(mutators);
        self
    }

    /// Validate the handler and build it
    ///
    /// Fails when a variable is defined twice, when a mutator reads a variable
    /// or field path absent from the advertised schemas, or when a mutator's
    /// selector does not name the kind its mutate fn decodes.
    pub fn build(self, registry: Arc<ObjectRegistry>) -> Result<MetaHandler> {
        for (i, definition) in self.variables.iter().enumerate() {
            if self.variables[..i].iter().any(|d| d.name == definition.name) {
                return Err(Error::schema(
                    &definition.name,
                    format!("variable defined twice in handler {}", self.name),
                ));
            }
        }

        for mutator in &self.mutators {
            validate_mutator(mutator.as_ref(), &self.variables, &registry)?;
        }

        debug!(
            handler = %self.name,
            variables = self.variables.len(),
            mutators = self.mutators.len(),
            "built meta handler"
        );

        Ok(MetaHandler {
            name: self.name,
            variables: self.variables,
            mutators: self.mutators,
            registry,
        })
    }
}

fn validate_mutator(
    mutator: &dyn Mutate,
    variables: &[VariableDefinition],
    registry: &ObjectRegistry,
) -> Result<()> {
    let variable = mutator.variable();
    let definition = variables
        .iter()
        .find(|d| d.name == variable.name)
        .ok_or_else(|| {
            Error::schema(
                variable.name,
                format!("mutator {} reads a variable the handler does not define", mutator.name()),
            )
        })?;

    if definition.schema.property_at(variable.path).is_none() {
        return Err(Error::schema(
            variable.name,
            format!(
                "mutator {} reads {} which is not in the advertised schema",
                mutator.name(),
                variable
            ),
        ));
    }

    let kind = mutator.template_kind();
    let selector = mutator.selector();
    if selector.api_version != kind.api_version() || selector.kind != kind.kind_str() {
        return Err(Error::config(format!(
            "mutator {} selects {}/{} but mutates {}",
            mutator.name(),
            selector.api_version,
            selector.kind,
            kind
        )));
    }
    if !registry.contains(kind) {
        return Err(Error::config(format!(
            "mutator {} mutates {} which is not in the object registry",
            mutator.name(),
            kind
        )));
    }

    let resources = &selector.match_resources;
    if !resources.infrastructure_cluster
        && !resources.control_plane
        && resources.machine_deployment_class.is_none()
    {
        warn!(
            mutator = %mutator.name(),
            "selector has no matchResources set and will never match"
        );
    }
    Ok(())
}

impl MetaHandler {
    /// Start building a handler with the given name
    pub fn builder(name: impl Into<String>) -> MetaHandlerBuilder {
        MetaHandlerBuilder {
            name: name.into(),
            variables: Vec::new(),
            mutators: Vec::new(),
        }
    }

    /// Handler name as registered with CAPI
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variables this handler defines
    pub fn variables(&self) -> &[VariableDefinition] {
        &self.variables
    }

    /// Mutators in execution order
    pub fn mutators(&self) -> impl Iterator<Item = &dyn Mutate> {
        self.mutators.iter().map(|m| m.as_ref())
    }

    /// Answer DiscoverVariables with one entry per defined variable
    #[instrument(skip_all, fields(handler = %self.name))]
    pub fn discover_variables(
        &self,
        _request: &DiscoverVariablesRequest,
    ) -> DiscoverVariablesResponse {
        let response = DiscoverVariablesResponse {
            variables: self
                .variables
                .iter()
                .map(VariableDefinition::to_cluster_class_variable)
                .collect(),
            ..Default::default()
        };
        debug!(variables = response.variables.len(), "discovered variables");
        response
    }

    /// Answer GeneratePatches
    ///
    /// Items are processed in request order and mutators in declaration
    /// order. Any failure fails the whole response. `cancel` is checked
    /// between items.
    #[instrument(skip_all, fields(handler = %self.name, items = request.items.len()))]
    pub fn generate_patches(
        &self,
        request: &GeneratePatchesRequest,
        cancel: &CancellationToken,
    ) -> GeneratePatchesResponse {
        let mut response = GeneratePatchesResponse::default();
        match self.try_generate_patches(request, cancel) {
            Ok(items) => {
                debug!(patched = items.len(), "generated patches");
                response.items = items;
            }
            Err(e) => {
                warn!(error = %e, "patch generation failed");
                response.fail(e.to_string());
            }
        }
        response
    }

    fn try_generate_patches(
        &self,
        request: &GeneratePatchesRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<GeneratePatchesResponseItem>> {
        let global = variable_map(&request.variables);
        let mut patches = PatchSet::new();

        for item in &request.items {
            if cancel.is_cancelled() {
                return Err(Error::cancelled(format!(
                    "handler {} cancelled before item {}",
                    self.name, item.uid
                )));
            }

            let variables = merge_variable_maps(&global, &item.variables);
            for mutator in &self.mutators {
                mutator.generate(&self.registry, item, &variables, &mut patches)?;
            }
        }

        patches.into_response_items()
    }

    /// Answer ValidateTopology
    ///
    /// Every mutator's variable is resolved against every item's effective
    /// variables; unset variables pass, wrongly typed ones fail.
    #[instrument(skip_all, fields(handler = %self.name, items = request.items.len()))]
    pub fn validate_topology(&self, request: &ValidateTopologyRequest) -> HookResponse {
        let global = variable_map(&request.variables);
        let scopes: Vec<VariableMap> = if request.items.is_empty() {
            vec![global]
        } else {
            request
                .items
                .iter()
                .map(|item| merge_variable_maps(&global, &item.variables))
                .collect()
        };

        for variables in &scopes {
            for mutator in &self.mutators {
                if let Err(e) = mutator.lookup(variables) {
                    warn!(mutator = %mutator.name(), error = %e, "topology validation failed");
                    return HookResponse::failure(Hook::ValidateTopology, e.to_string());
                }
            }
        }

        HookResponse::success(Hook::ValidateTopology)
    }
}
