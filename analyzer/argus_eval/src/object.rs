//! Runtime objects of the symbolic evaluator.
//!
//! Everything the walk produces is an [`Object`]. Concrete scalars
//! appear when literals fold; everything uncertain becomes a
//! [`PlaceholderObj`] carrying whatever static type information the
//! analysis could keep. Shared mutable state (variables, instances,
//! pointers) uses `Rc<RefCell<…>>` — the walk is single-threaded by
//! design.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use argus_scan::{FieldType, FunctionInfo, MethodSpec, PackageInfo, ParamInfo, TypeInfo};
use argus_syntax::ast;

use crate::env::Env;
use crate::stack::FrameSnapshot;

/// Host function callable by the evaluator in place of a scanned
/// function. The first argument is the callee object, the rest are the
/// evaluated call arguments.
pub type IntrinsicFn = Rc<dyn Fn(&crate::evaluator::Evaluator, &[Object]) -> Object>;

/// A mutable binding with static type and interface-dispatch tracking.
pub struct VariableObj {
    pub name: String,
    /// Declared (static) type, when one was written or inferable.
    pub static_type: Option<Arc<FieldType>>,
    /// Whether the static type resolved to an interface.
    pub interface_typed: bool,
    pub value: RefCell<Object>,
    /// Concrete static type keys (`pkg.T`, `*pkg.T`) ever assigned.
    pub possible_types: RefCell<FxHashSet<String>>,
}

pub struct PointerObj {
    pub pointee: RefCell<Object>,
}

/// A concrete composite value with a resolved type.
pub struct InstanceObj {
    pub type_info: Arc<TypeInfo>,
    pub field_type: Option<Arc<FieldType>>,
    pub fields: RefCell<FxHashMap<String, Object>>,
}

pub struct SliceObj {
    pub elem_type: Option<Arc<FieldType>>,
    pub elems: RefCell<Vec<Object>>,
}

pub struct MapObj {
    pub key_type: Option<Arc<FieldType>>,
    pub value_type: Option<Arc<FieldType>>,
    pub entries: RefCell<Vec<(Object, Object)>>,
}

pub struct ChannelObj {
    pub elem_type: Option<Arc<FieldType>>,
}

/// A callable with closure environment.
pub struct FunctionObj {
    /// Declared name; empty for function literals.
    pub name: String,
    /// Link to the scanned declaration, absent for literals.
    pub info: Option<Arc<FunctionInfo>>,
    pub params: Vec<ParamInfo>,
    pub results: Vec<ParamInfo>,
    pub variadic: bool,
    /// File owning the body arena.
    pub file: Arc<ast::File>,
    pub pkg: Arc<PackageInfo>,
    pub body: Option<ast::StmtId>,
    /// Definition-site environment, captured by reference.
    pub env: Env,
    /// Bound receiver (`name`, value) for method values.
    pub receiver: Option<(String, Object)>,
}

impl FunctionObj {
    /// `pkg.Func` / `(pkg.T).Method` key for tracing and recursion
    /// detection.
    pub fn qualified_name(&self) -> String {
        match &self.info {
            Some(info) => info.qualified_name(),
            None => format!("{}.func literal", self.pkg.import_path),
        }
    }
}

/// An unknown value carrying static knowledge.
pub struct PlaceholderObj {
    pub reason: String,
    pub static_type: Option<Arc<FieldType>>,
    /// Resolved type record, when the static type resolved.
    pub type_info: Option<Arc<TypeInfo>>,
    /// The value this placeholder was projected from (type assertions
    /// keep a link to the asserted value).
    pub origin: Option<Object>,
    /// Interface method this placeholder abstracts, for dispatch
    /// tracing.
    pub underlying_method: Option<MethodSpec>,
    /// Scanned function this placeholder abstracts (out-of-policy
    /// calls).
    pub underlying_function: Option<Arc<FunctionInfo>>,
    /// Tracked concrete types of the source interface variable.
    pub possible_concrete_types: Vec<String>,
}

impl PlaceholderObj {
    pub fn new(reason: impl Into<String>) -> PlaceholderObj {
        PlaceholderObj {
            reason: reason.into(),
            static_type: None,
            type_info: None,
            origin: None,
            underlying_method: None,
            underlying_function: None,
            possible_concrete_types: Vec::new(),
        }
    }

    pub fn with_type(mut self, ty: Arc<FieldType>) -> PlaceholderObj {
        self.static_type = Some(ty);
        self
    }

    pub fn with_info(mut self, info: Arc<TypeInfo>) -> PlaceholderObj {
        self.type_info = Some(info);
        self
    }

    pub fn with_origin(mut self, origin: Object) -> PlaceholderObj {
        self.origin = Some(origin);
        self
    }
}

/// An evaluation error as a value, with a call-stack snapshot.
pub struct ErrorObj {
    pub message: String,
    /// `path:line:col` of the offending node, when known.
    pub position: Option<String>,
    pub stack: Vec<FrameSnapshot>,
}

impl fmt::Display for ErrorObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(pos) => write!(f, "{pos}: {}", self.message)?,
            None => write!(f, "{}", self.message)?,
        }
        for frame in self.stack.iter().rev() {
            write!(f, "\n\tat {frame}")?;
        }
        Ok(())
    }
}

/// A package reference with a lazily populated environment.
pub struct PackageObj {
    pub path: String,
    pub info: RefCell<Option<Arc<PackageInfo>>>,
    pub env: Env,
}

/// A type used as a value (conversions, composite literals, method
/// expressions).
pub struct TypeObj {
    pub field_type: Arc<FieldType>,
    pub info: Option<Arc<TypeInfo>>,
}

/// The tagged object variants.
#[derive(Clone)]
pub enum Object {
    Integer(i64),
    Float(f64),
    Complex { re: f64, im: f64 },
    Str(Rc<String>),
    Boolean(bool),
    Nil,
    Variable(Rc<VariableObj>),
    Pointer(Rc<PointerObj>),
    Instance(Rc<InstanceObj>),
    Slice(Rc<SliceObj>),
    Map(Rc<MapObj>),
    Channel(Rc<ChannelObj>),
    Function(Rc<FunctionObj>),
    Placeholder(Rc<PlaceholderObj>),
    MultiReturn(Rc<Vec<Object>>),
    /// A value propagating out of a function body.
    Return(Rc<Object>),
    Break { label: Option<String> },
    Continue { label: Option<String> },
    Error(Rc<ErrorObj>),
    Package(Rc<PackageObj>),
    Type(Rc<TypeObj>),
    Intrinsic(IntrinsicFn),
}

impl Object {
    pub fn string(value: impl Into<String>) -> Object {
        Object::Str(Rc::new(value.into()))
    }

    pub fn placeholder(p: PlaceholderObj) -> Object {
        Object::Placeholder(Rc::new(p))
    }

    pub fn error_msg(message: impl Into<String>) -> Object {
        Object::Error(Rc::new(ErrorObj {
            message: message.into(),
            position: None,
            stack: Vec::new(),
        }))
    }

    /// Is this a control-flow object that short-circuits statement
    /// sequences?
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Object::Return(_) | Object::Break { .. } | Object::Continue { .. } | Object::Error(_)
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    /// Strip `Variable` and `Return` wrappers down to the carried
    /// value.
    pub fn unwrap_value(&self) -> Object {
        match self {
            Object::Variable(v) => v.value.borrow().unwrap_value(),
            Object::Return(inner) => inner.unwrap_value(),
            other => other.clone(),
        }
    }

    /// Field lookup through wrappers: variables, pointers, instances,
    /// and placeholders with an origin.
    pub fn field(&self, name: &str) -> Option<Object> {
        match self {
            Object::Variable(v) => v.value.borrow().field(name),
            Object::Pointer(p) => p.pointee.borrow().field(name),
            Object::Instance(inst) => inst.fields.borrow().get(name).cloned(),
            Object::Placeholder(p) => p.origin.as_ref().and_then(|o| o.field(name)),
            _ => None,
        }
    }

    /// The resolved type record carried by this value, if any.
    pub fn type_info(&self) -> Option<Arc<TypeInfo>> {
        match self {
            Object::Instance(inst) => Some(Arc::clone(&inst.type_info)),
            Object::Placeholder(p) => p
                .type_info
                .clone()
                .or_else(|| p.origin.as_ref().and_then(Object::type_info)),
            Object::Variable(v) => v.value.borrow().type_info(),
            Object::Pointer(p) => p.pointee.borrow().type_info(),
            Object::Type(t) => t.info.clone(),
            _ => None,
        }
    }

    /// Concrete static type key (`pkg.T`, `*pkg.T`, builtin name) for
    /// possible-type tracking.
    pub fn type_key(&self) -> Option<String> {
        match self {
            Object::Integer(_) => Some("int".to_string()),
            Object::Float(_) => Some("float64".to_string()),
            Object::Complex { .. } => Some("complex128".to_string()),
            Object::Str(_) => Some("string".to_string()),
            Object::Boolean(_) => Some("bool".to_string()),
            Object::Instance(inst) => Some(inst.type_info.key()),
            Object::Pointer(p) => p.pointee.borrow().type_key().map(|k| format!("*{k}")),
            Object::Variable(v) => v.value.borrow().type_key(),
            Object::Placeholder(p) => p
                .type_info
                .as_ref()
                .map(|info| {
                    let key = info.key();
                    let pointer = p
                        .static_type
                        .as_ref()
                        .is_some_and(|ty| ty.is_pointer());
                    if pointer {
                        format!("*{key}")
                    } else {
                        key
                    }
                })
                .or_else(|| p.static_type.as_ref().map(|ty| ty.type_key())),
            _ => None,
        }
    }

    /// Short debugging/tracing rendering; also the argument inspection
    /// string for the recursion guard.
    pub fn inspect(&self) -> String {
        match self {
            Object::Integer(v) => v.to_string(),
            Object::Float(v) => v.to_string(),
            Object::Complex { re, im } => format!("({re}+{im}i)"),
            Object::Str(s) => format!("{s:?}"),
            Object::Boolean(v) => v.to_string(),
            Object::Nil => "nil".to_string(),
            Object::Variable(v) => format!("var {}={}", v.name, v.value.borrow().inspect()),
            Object::Pointer(p) => format!("&{}", p.pointee.borrow().inspect()),
            Object::Instance(inst) => format!("{}{{…}}", inst.type_info.key()),
            Object::Slice(s) => format!("slice(len={})", s.elems.borrow().len()),
            Object::Map(m) => format!("map(len={})", m.entries.borrow().len()),
            Object::Channel(_) => "chan".to_string(),
            Object::Function(f) => f.qualified_name(),
            Object::Placeholder(p) => match &p.static_type {
                Some(ty) => format!("<{ty}>"),
                None => "<?>".to_string(),
            },
            Object::MultiReturn(values) => {
                let parts: Vec<String> = values.iter().map(Object::inspect).collect();
                format!("({})", parts.join(", "))
            }
            Object::Return(inner) => format!("return {}", inner.inspect()),
            Object::Break { .. } => "break".to_string(),
            Object::Continue { .. } => "continue".to_string(),
            Object::Error(e) => format!("error: {}", e.message),
            Object::Package(p) => format!("package {}", p.path),
            Object::Type(t) => format!("type {}", t.field_type),
            Object::Intrinsic(_) => "intrinsic".to_string(),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_field_lookup_through_wrappers() {
        let info = Arc::new(TypeInfo::placeholder("p", "T"));
        let instance = Object::Instance(Rc::new(InstanceObj {
            type_info: info,
            field_type: None,
            fields: RefCell::new(FxHashMap::default()),
        }));
        if let Object::Instance(inst) = &instance {
            inst.fields
                .borrow_mut()
                .insert("Name".to_string(), Object::string("Alice"));
        }
        let pointer = Object::Pointer(Rc::new(PointerObj {
            pointee: RefCell::new(instance.clone()),
        }));
        let placeholder = Object::placeholder(
            PlaceholderObj::new("projected").with_origin(pointer.clone()),
        );
        for obj in [instance, pointer, placeholder] {
            let field = obj.field("Name").unwrap();
            assert_eq!(field.inspect(), "\"Alice\"");
        }
    }

    #[test]
    fn test_type_key_pointer_chain() {
        let info = Arc::new(TypeInfo::placeholder("example.com/m/a", "T"));
        let instance = Object::Instance(Rc::new(InstanceObj {
            type_info: info,
            field_type: None,
            fields: RefCell::new(FxHashMap::default()),
        }));
        let pointer = Object::Pointer(Rc::new(PointerObj {
            pointee: RefCell::new(instance),
        }));
        assert_eq!(pointer.type_key().as_deref(), Some("*example.com/m/a.T"));
    }
}
