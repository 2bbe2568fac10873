//! Parsed WSDL abstraction.
//!
//! The gateway parses WSDL documents elsewhere; resolution only needs the
//! binding operations and, for each one, its style, SOAP action, input parts
//! and SOAP body binding. These types carry exactly that.

use serde::{Deserialize, Serialize};

use crate::qname::QName;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// SOAP binding style, declared on the operation or inherited from the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingStyle {
    Rpc,
    Document,
}

/// WSDL 1.1 transmission primitive of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    #[default]
    RequestResponse,
    OneWay,
    SolicitResponse,
    Notification,
}

impl OperationKind {
    /// Whether the client initiates this operation with an input message.
    #[must_use]
    pub fn is_inbound(self) -> bool {
        matches!(self, Self::RequestResponse | Self::OneWay)
    }
}

/// `use` attribute of a `soap:body` binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyUse {
    #[default]
    Literal,
    Encoded,
}

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

/// `soap:body` binding details of an operation input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoapBody {
    #[serde(rename = "use", default)]
    pub body_use: BodyUse,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// One part of an abstract WSDL message.
///
/// A well-formed part declares exactly one of `type_name` or `element_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    pub name: String,
    #[serde(default)]
    pub type_name: Option<QName>,
    #[serde(default)]
    pub element_name: Option<QName>,
}

impl MessagePart {
    #[must_use]
    pub fn element(name: impl Into<String>, element: QName) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            element_name: Some(element),
        }
    }

    #[must_use]
    pub fn typed(name: impl Into<String>, type_name: QName) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name),
            element_name: None,
        }
    }
}

/// Input side of a binding operation: the abstract message parts plus the
/// SOAP body binding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInput {
    #[serde(default)]
    pub parts: Vec<MessagePart>,
    #[serde(default)]
    pub body: Option<SoapBody>,
}

/// A single `wsdl:operation` inside a `wsdl:binding`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingOperation {
    pub name: String,
    /// Operation-level style; falls back to the binding's style when absent.
    #[serde(default)]
    pub style: Option<BindingStyle>,
    #[serde(default)]
    pub soap_action: Option<String>,
    #[serde(default)]
    pub kind: OperationKind,
    #[serde(default)]
    pub input: Option<OperationInput>,
}

impl BindingOperation {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            style: None,
            soap_action: None,
            kind: OperationKind::RequestResponse,
            input: None,
        }
    }

    /// Style declared on the operation, otherwise on its binding.
    #[must_use]
    pub fn effective_style(&self, binding: &Binding) -> Option<BindingStyle> {
        self.style.or(binding.style)
    }

    #[must_use]
    pub fn input_parts(&self) -> &[MessagePart] {
        self.input.as_ref().map_or(&[], |input| input.parts.as_slice())
    }

    #[must_use]
    pub fn soap_body(&self) -> Option<&SoapBody> {
        self.input.as_ref().and_then(|input| input.body.as_ref())
    }
}

/// A `wsdl:binding` with its operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub name: String,
    #[serde(default)]
    pub style: Option<BindingStyle>,
    #[serde(default)]
    pub operations: Vec<BindingOperation>,
}

/// A parsed WSDL document reduced to what service resolution consumes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wsdl {
    #[serde(default)]
    pub target_namespace: String,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

impl Wsdl {
    /// Iterates every operation of every binding, paired with its binding.
    pub fn binding_operations(&self) -> impl Iterator<Item = (&Binding, &BindingOperation)> {
        self.bindings
            .iter()
            .flat_map(|binding| binding.operations.iter().map(move |op| (binding, op)))
    }
}
