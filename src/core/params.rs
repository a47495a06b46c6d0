//! Typed parameter storage.
//!
//! Parameters are set by the application and only read during commit. Object
//! parameters hold strong references, so everything an object may read stays
//! alive for as long as it is referenced.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::object::{ObjectHeader, SceneObject};
use crate::array::Array;
use crate::scene::{Camera, Geometry, Group, Instance, Light, Material, Renderer, Sampler, SpatialField, Surface, Volume, World};
use crate::util::{Mat4, UVec2, UVec3, Vec2, Vec3, Vec4};

/// Reference to any scene object that can appear as a parameter.
#[derive(Clone)]
pub enum ObjectRef {
    Array(Arc<Array>),
    Sampler(Arc<Sampler>),
    SpatialField(Arc<SpatialField>),
    Geometry(Arc<Geometry>),
    Material(Arc<Material>),
    Volume(Arc<Volume>),
    Surface(Arc<Surface>),
    Light(Arc<Light>),
    Group(Arc<Group>),
    Instance(Arc<Instance>),
    World(Arc<World>),
    Camera(Arc<Camera>),
    Renderer(Arc<Renderer>),
}

impl ObjectRef {
    pub fn as_object(&self) -> &dyn SceneObject {
        match self {
            Self::Array(o) => o.as_ref(),
            Self::Sampler(o) => o.as_ref(),
            Self::SpatialField(o) => o.as_ref(),
            Self::Geometry(o) => o.as_ref(),
            Self::Material(o) => o.as_ref(),
            Self::Volume(o) => o.as_ref(),
            Self::Surface(o) => o.as_ref(),
            Self::Light(o) => o.as_ref(),
            Self::Group(o) => o.as_ref(),
            Self::Instance(o) => o.as_ref(),
            Self::World(o) => o.as_ref(),
            Self::Camera(o) => o.as_ref(),
            Self::Renderer(o) => o.as_ref(),
        }
    }

    #[inline]
    pub fn header(&self) -> &ObjectHeader {
        self.as_object().header()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.header();
        write!(f, "{}:{}#{}", h.kind(), h.subtype(), h.id())
    }
}

/// Typed extraction of an object parameter.
pub trait FromObjectRef: Sized {
    fn from_object_ref(r: &ObjectRef) -> Option<Arc<Self>>;
}

macro_rules! object_ref_conversions {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl FromObjectRef for $ty {
                fn from_object_ref(r: &ObjectRef) -> Option<Arc<Self>> {
                    match r {
                        ObjectRef::$ty(o) => Some(o.clone()),
                        _ => None,
                    }
                }
            }

            impl From<Arc<$ty>> for ObjectRef {
                fn from(o: Arc<$ty>) -> Self {
                    Self::$ty(o)
                }
            }

            impl From<Arc<$ty>> for ParamValue {
                fn from(o: Arc<$ty>) -> Self {
                    Self::Object(ObjectRef::$ty(o))
                }
            }

            impl From<&Arc<$ty>> for ParamValue {
                fn from(o: &Arc<$ty>) -> Self {
                    Self::Object(ObjectRef::$ty(o.clone()))
                }
            }

            impl From<Vec<Arc<$ty>>> for ParamValue {
                fn from(list: Vec<Arc<$ty>>) -> Self {
                    Self::ObjectList(list.into_iter().map(ObjectRef::$ty).collect())
                }
            }

            impl From<&[Arc<$ty>]> for ParamValue {
                fn from(list: &[Arc<$ty>]) -> Self {
                    Self::ObjectList(list.iter().cloned().map(ObjectRef::$ty).collect())
                }
            }
        )+
    };
}

object_ref_conversions!(
    Array, Sampler, SpatialField, Geometry, Material, Volume, Surface, Light, Group, Instance, World, Camera, Renderer,
);

/// A single parameter value.
#[derive(Clone, Debug)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    UVec2(UVec2),
    UVec3(UVec3),
    Mat4(Mat4),
    String(String),
    Object(ObjectRef),
    ObjectList(Vec<ObjectRef>),
}

impl ParamValue {
    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "BOOL",
            Self::Int(_) => "INT32",
            Self::UInt(_) => "UINT32",
            Self::Float(_) => "FLOAT32",
            Self::Vec2(_) => "FLOAT32_VEC2",
            Self::Vec3(_) => "FLOAT32_VEC3",
            Self::Vec4(_) => "FLOAT32_VEC4",
            Self::UVec2(_) => "UINT32_VEC2",
            Self::UVec3(_) => "UINT32_VEC3",
            Self::Mat4(_) => "FLOAT32_MAT4",
            Self::String(_) => "STRING",
            Self::Object(_) => "OBJECT",
            Self::ObjectList(_) => "OBJECT_LIST",
        }
    }
}

macro_rules! param_value_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )+
    };
}

param_value_from!(
    bool => Bool,
    i32 => Int,
    u32 => UInt,
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    UVec2 => UVec2,
    UVec3 => UVec3,
    Mat4 => Mat4,
    String => String,
    &str => String,
    [f32; 2] => Vec2,
    [f32; 3] => Vec3,
    [f32; 4] => Vec4,
    [u32; 2] => UVec2,
);

/// Typed extraction of a plain parameter value.
pub trait FromParam: Sized {
    fn from_param(v: &ParamValue) -> Option<Self>;
}

impl FromParam for bool {
    fn from_param(v: &ParamValue) -> Option<Self> {
        match *v {
            ParamValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl FromParam for i32 {
    fn from_param(v: &ParamValue) -> Option<Self> {
        match *v {
            ParamValue::Int(i) => Some(i),
            ParamValue::UInt(u) => i32::try_from(u).ok(),
            _ => None,
        }
    }
}

impl FromParam for u32 {
    fn from_param(v: &ParamValue) -> Option<Self> {
        match *v {
            ParamValue::UInt(u) => Some(u),
            ParamValue::Int(i) => u32::try_from(i).ok(),
            _ => None,
        }
    }
}

impl FromParam for f32 {
    fn from_param(v: &ParamValue) -> Option<Self> {
        match *v {
            ParamValue::Float(f) => Some(f),
            ParamValue::Int(i) => Some(i as f32),
            ParamValue::UInt(u) => Some(u as f32),
            _ => None,
        }
    }
}

impl FromParam for String {
    fn from_param(v: &ParamValue) -> Option<Self> {
        match v {
            ParamValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

macro_rules! from_param_exact {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl FromParam for $ty {
                fn from_param(v: &ParamValue) -> Option<Self> {
                    match v {
                        ParamValue::$variant(x) => Some(*x),
                        _ => None,
                    }
                }
            }
        )+
    };
}

from_param_exact!(
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    UVec2 => UVec2,
    UVec3 => UVec3,
    Mat4 => Mat4,
);

/// Named parameters of one object.
#[derive(Clone, Debug, Default)]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.values.remove(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[inline]
    pub fn raw(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Typed lookup; `None` when missing or of another type.
    pub fn get<T: FromParam>(&self, name: &str) -> Option<T> {
        self.values.get(name).and_then(T::from_param)
    }

    pub fn get_or<T: FromParam>(&self, name: &str, default: T) -> T {
        self.get(name).unwrap_or(default)
    }

    pub fn string(&self, name: &str, default: &str) -> String {
        self.get::<String>(name).unwrap_or_else(|| default.to_string())
    }

    /// Object lookup; `None` when missing or of another kind.
    pub fn object<T: FromObjectRef>(&self, name: &str) -> Option<Arc<T>> {
        match self.values.get(name)? {
            ParamValue::Object(r) => T::from_object_ref(r),
            _ => None,
        }
    }

    /// Object list lookup. A single object counts as a list of one; entries of
    /// another kind are skipped.
    pub fn objects<T: FromObjectRef>(&self, name: &str) -> Vec<Arc<T>> {
        match self.values.get(name) {
            Some(ParamValue::ObjectList(list)) => list.iter().filter_map(T::from_object_ref).collect(),
            Some(ParamValue::Object(r)) => T::from_object_ref(r).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    #[inline]
    pub fn array(&self, name: &str) -> Option<Arc<Array>> {
        self.object::<Array>(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_lookup() {
        let mut p = ParameterSet::default();
        p.set("radius", 0.5f32);
        p.set("caps", "none");
        p.set("id", 7u32);
        p.set("origin", [1.0f32, 2.0, 3.0]);

        assert_eq!(p.get::<f32>("radius"), Some(0.5));
        assert_eq!(p.get::<i32>("id"), Some(7));
        assert_eq!(p.get::<Vec3>("origin"), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(p.string("caps", "both"), "none");
        assert_eq!(p.string("filter", "linear"), "linear");
        assert_eq!(p.get_or("densityScale", 1.0f32), 1.0);
        assert_eq!(p.get::<Vec4>("origin"), None);
    }

    #[test]
    fn test_negative_int_is_not_u32() {
        let mut p = ParameterSet::default();
        p.set("v", -1i32);
        assert_eq!(p.get::<u32>("v"), None);
        assert_eq!(p.get::<f32>("v"), Some(-1.0));
    }

    #[test]
    fn test_missing_objects_are_empty() {
        let p = ParameterSet::default();
        assert!(p.array("vertex.position").is_none());
        assert!(p.objects::<Surface>("surface").is_empty());
    }
}
