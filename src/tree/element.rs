// src/tree/element.rs

use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;

use crate::tree::namespace::NamespaceId;
use crate::tree::Name;

/// Metadata key holding the JVM access flags as a decimal number.
pub const ACCESS_KEY: &str = "access";
pub const LICENSE_KEY: &str = "license";
pub const LICENSE_URL_KEY: &str = "license_url";

bitflags::bitflags! {
    /// JVM access flags as they appear in class files.
    ///
    /// Some bits are shared between element kinds: `SYNCHRONIZED` is
    /// `ACC_SUPER` on classes and `BRIDGE` is `ACC_VOLATILE` on fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Access: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

/// One optional destination name (or descriptor) per namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Names(Vec<Option<Name>>);

impl Names {
    pub fn get(&self, ns: NamespaceId) -> Option<&str> {
        self.0.get(ns.0).and_then(|n| n.as_deref())
    }

    /// Shared handle to the stored name, for callers that want to keep it.
    pub fn get_shared(&self, ns: NamespaceId) -> Option<&Name> {
        self.0.get(ns.0).and_then(|n| n.as_ref())
    }

    pub fn set(&mut self, ns: NamespaceId, name: impl Into<Name>) {
        if self.0.len() <= ns.0 {
            self.0.resize(ns.0 + 1, None);
        }
        self.0[ns.0] = Some(name.into());
    }

    pub fn clear(&mut self, ns: NamespaceId) -> Option<Name> {
        self.0.get_mut(ns.0).and_then(Option::take)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NamespaceId, &str)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_deref().map(|n| (NamespaceId(i), n)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata(IndexMap<Name, Name>);

impl Metadata {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| &**v)
    }

    pub fn insert(&mut self, key: impl Into<Name>, value: impl Into<Name>) -> Option<Name> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Name> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0.iter().map(|(k, v)| (&**k, &**v))
    }

    /// Parsed access flags; `None` when absent or malformed.
    pub fn access(&self) -> Option<Access> {
        self.get(ACCESS_KEY)?.trim().parse::<u16>().ok().map(Access::from_bits_retain)
    }

    pub fn set_access(&mut self, access: Access) {
        self.insert(ACCESS_KEY, access.bits().to_string());
    }
}

/// Source identity of a field or method inside its owner class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberKey {
    pub name: Name,
    pub desc: Name,
}

impl MemberKey {
    pub fn new(name: impl Into<Name>, desc: impl Into<Name>) -> Self {
        Self { name: name.into(), desc: desc.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Class,
    Field,
    Method,
    Param,
}

/// Value-typed address of an element inside one tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementRef {
    Class(Name),
    Field { owner: Name, key: MemberKey },
    Method { owner: Name, key: MemberKey },
    Param { owner: Name, key: MemberKey, lv_index: u16 },
}

impl ElementRef {
    pub fn class(name: impl Into<Name>) -> Self {
        Self::Class(name.into())
    }

    pub fn field(owner: impl Into<Name>, name: impl Into<Name>, desc: impl Into<Name>) -> Self {
        Self::Field { owner: owner.into(), key: MemberKey::new(name, desc) }
    }

    pub fn method(owner: impl Into<Name>, name: impl Into<Name>, desc: impl Into<Name>) -> Self {
        Self::Method { owner: owner.into(), key: MemberKey::new(name, desc) }
    }

    pub fn param(
        owner: impl Into<Name>,
        name: impl Into<Name>,
        desc: impl Into<Name>,
        lv_index: u16,
    ) -> Self {
        Self::Param { owner: owner.into(), key: MemberKey::new(name, desc), lv_index }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Class(_) => ElementKind::Class,
            Self::Field { .. } => ElementKind::Field,
            Self::Method { .. } => ElementKind::Method,
            Self::Param { .. } => ElementKind::Param,
        }
    }

    /// Source name of the class this element lives in (or is).
    pub fn owner(&self) -> &Name {
        match self {
            Self::Class(name) => name,
            Self::Field { owner, .. } | Self::Method { owner, .. } | Self::Param { owner, .. } => {
                owner
            }
        }
    }

    pub fn member_key(&self) -> Option<&MemberKey> {
        match self {
            Self::Class(_) => None,
            Self::Field { key, .. } | Self::Method { key, .. } | Self::Param { key, .. } => Some(key),
        }
    }

    /// True if `self` is `other` or lives inside it.
    pub fn is_within(&self, other: &ElementRef) -> bool {
        if self == other {
            return true;
        }
        match (other, self) {
            (Self::Class(class), _) => self.owner() == class,
            (
                Self::Method { owner, key },
                Self::Param { owner: param_owner, key: param_key, .. },
            ) => owner == param_owner && key == param_key,
            _ => false,
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(name) => write!(f, "{name}"),
            Self::Field { owner, key } => write!(f, "{owner}.{}:{}", key.name, key.desc),
            Self::Method { owner, key } => write!(f, "{owner}.{}{}", key.name, key.desc),
            Self::Param { owner, key, lv_index } => {
                write!(f, "{owner}.{}{}#{lv_index}", key.name, key.desc)
            }
        }
    }
}

/// Shared view over the parts every element kind carries.
pub trait Element {
    fn src_name(&self) -> &str;
    fn names(&self) -> &Names;
    fn names_mut(&mut self) -> &mut Names;
    fn metadata(&self) -> &Metadata;
    fn metadata_mut(&mut self) -> &mut Metadata;

    fn access(&self) -> Option<Access> {
        self.metadata().access()
    }

    fn is_synthetic(&self) -> bool {
        self.access().is_some_and(|a| a.contains(Access::SYNTHETIC))
    }
}

#[derive(Debug, Clone)]
pub struct ClassMapping {
    pub(crate) src: Name,
    pub(crate) names: Names,
    pub(crate) metadata: Metadata,
    pub(crate) fields: IndexMap<MemberKey, FieldMapping>,
    pub(crate) methods: IndexMap<MemberKey, MethodMapping>,
}

impl ClassMapping {
    pub(crate) fn new(src: Name) -> Self {
        Self {
            src,
            names: Names::default(),
            metadata: Metadata::default(),
            fields: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    pub fn to_ref(&self) -> ElementRef {
        ElementRef::Class(self.src.clone())
    }

    pub fn fields(&self) -> impl ExactSizeIterator<Item = &FieldMapping> + '_ {
        self.fields.values()
    }

    pub fn methods(&self) -> impl ExactSizeIterator<Item = &MethodMapping> + '_ {
        self.methods.values()
    }

    pub fn field(&self, name: &str, desc: &str) -> Option<&FieldMapping> {
        self.fields.get(&MemberKey::new(name, desc))
    }

    pub fn method(&self, name: &str, desc: &str) -> Option<&MethodMapping> {
        self.methods.get(&MemberKey::new(name, desc))
    }

    pub fn method_by_key(&self, key: &MemberKey) -> Option<&MethodMapping> {
        self.methods.get(key)
    }

    pub(crate) fn field_or_insert(&mut self, key: MemberKey) -> &mut FieldMapping {
        self.fields.entry(key.clone()).or_insert_with(|| FieldMapping::new(key))
    }

    pub(crate) fn method_or_insert(&mut self, key: MemberKey) -> &mut MethodMapping {
        self.methods.entry(key.clone()).or_insert_with(|| MethodMapping::new(key))
    }
}

impl Element for ClassMapping {
    fn src_name(&self) -> &str {
        &self.src
    }
    fn names(&self) -> &Names {
        &self.names
    }
    fn names_mut(&mut self) -> &mut Names {
        &mut self.names
    }
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub(crate) key: MemberKey,
    pub(crate) names: Names,
    pub(crate) descs: Names,
    pub(crate) metadata: Metadata,
}

impl FieldMapping {
    fn new(key: MemberKey) -> Self {
        Self { key, names: Names::default(), descs: Names::default(), metadata: Metadata::default() }
    }

    pub fn key(&self) -> &MemberKey {
        &self.key
    }

    pub fn src_desc(&self) -> &str {
        &self.key.desc
    }

    pub fn descs(&self) -> &Names {
        &self.descs
    }
}

impl Element for FieldMapping {
    fn src_name(&self) -> &str {
        &self.key.name
    }
    fn names(&self) -> &Names {
        &self.names
    }
    fn names_mut(&mut self) -> &mut Names {
        &mut self.names
    }
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[derive(Debug, Clone)]
pub struct MethodMapping {
    pub(crate) key: MemberKey,
    pub(crate) names: Names,
    pub(crate) descs: Names,
    pub(crate) metadata: Metadata,
    pub(crate) params: BTreeMap<u16, ParamMapping>,
}

impl MethodMapping {
    fn new(key: MemberKey) -> Self {
        Self {
            key,
            names: Names::default(),
            descs: Names::default(),
            metadata: Metadata::default(),
            params: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &MemberKey {
        &self.key
    }

    pub fn src_desc(&self) -> &str {
        &self.key.desc
    }

    pub fn descs(&self) -> &Names {
        &self.descs
    }

    pub fn params(&self) -> impl Iterator<Item = &ParamMapping> + '_ {
        self.params.values()
    }

    /// `<init>` and `<clinit>`.
    pub fn is_initializer(&self) -> bool {
        self.key.name.starts_with('<')
    }

    pub(crate) fn param_or_insert(&mut self, lv_index: u16) -> &mut ParamMapping {
        self.params.entry(lv_index).or_insert_with(|| ParamMapping::new(lv_index))
    }
}

impl Element for MethodMapping {
    fn src_name(&self) -> &str {
        &self.key.name
    }
    fn names(&self) -> &Names {
        &self.names
    }
    fn names_mut(&mut self) -> &mut Names {
        &mut self.names
    }
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// A method parameter, keyed by its local variable index.
#[derive(Debug, Clone)]
pub struct ParamMapping {
    pub(crate) lv_index: u16,
    src: Name,
    pub(crate) names: Names,
    pub(crate) metadata: Metadata,
}

impl ParamMapping {
    fn new(lv_index: u16) -> Self {
        Self {
            lv_index,
            src: lv_index.to_string().into(),
            names: Names::default(),
            metadata: Metadata::default(),
        }
    }

    pub fn lv_index(&self) -> u16 {
        self.lv_index
    }
}

impl Element for ParamMapping {
    /// Parameters have no obfuscated name; the local variable index stands in.
    fn src_name(&self) -> &str {
        &self.src
    }
    fn names(&self) -> &Names {
        &self.names
    }
    fn names_mut(&mut self) -> &mut Names {
        &mut self.names
    }
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
