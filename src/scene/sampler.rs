//! Samplers: image lookups, per-primitive lookups and attribute transforms.

use glam::{Mat4, Vec4};
use parking_lot::RwLock;
use std::sync::Arc;

use gpu_objects::{EmptyPayload, Image1DData, Image2DData, PrimIdSamplerData, SamplerGpuData, SamplerPayload};

use super::geometry::attribute_ptr;
use crate::array::Array;
use crate::core::{CommitScope, DeviceContext, ObjectHeader, SceneObject};
use crate::device::{DeviceTexture, TextureDesc, TextureFilter, WrapMode};
use crate::util::{Error, Result};

/// `inAttribute` name to attribute channel; `-1` disables the input.
fn attribute_channel(name: &str) -> Option<i32> {
    match name {
        "attribute0" => Some(0),
        "attribute1" => Some(1),
        "attribute2" => Some(2),
        "attribute3" => Some(3),
        "color" => Some(4),
        "none" => Some(-1),
        _ => None,
    }
}

enum SamplerKind {
    Image1D(DeviceTexture),
    Image2D(DeviceTexture),
    Primitive {
        data: PrimIdSamplerData,
        _array: Arc<Array>,
    },
    Transform,
}

struct SamplerState {
    kind: SamplerKind,
    attribute: i32,
    in_transform: Mat4,
    in_offset: Vec4,
    out_transform: Mat4,
    out_offset: Vec4,
}

pub struct Sampler {
    header: ObjectHeader,
    committed: RwLock<Option<SamplerState>>,
}

impl Sampler {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    pub fn gpu_data(&self) -> Result<SamplerGpuData> {
        self.header.ensure_committed()?;
        let guard = self.committed.read();
        let s = guard.as_ref().ok_or(Error::NotValid {
            kind: self.header.kind(),
            id: self.header.id(),
        })?;
        let payload = match &s.kind {
            SamplerKind::Image1D(tex) => SamplerPayload::Texture1D(Image1DData { texobj: tex.handle() }),
            SamplerKind::Image2D(tex) => SamplerPayload::Texture2D(Image2DData { texobj: tex.handle() }),
            SamplerKind::Primitive { data, .. } => SamplerPayload::Primitive(*data),
            SamplerKind::Transform => SamplerPayload::Transform(EmptyPayload::default()),
        };
        Ok(SamplerGpuData::new(
            s.attribute,
            s.in_transform,
            s.in_offset,
            s.out_transform,
            s.out_offset,
            payload,
        ))
    }

    /// True for a committed `image2D` sampler, the only kind usable as a
    /// background.
    pub fn is_image2d(&self) -> bool {
        matches!(self.committed.read().as_ref(), Some(SamplerState { kind: SamplerKind::Image2D(_), .. }))
    }
}

/// Texture over the `image` array. `rank` is the required array rank.
fn image_texture(scope: &mut CommitScope<'_>, rank: usize) -> Result<Option<DeviceTexture>> {
    let Some(image) = scope.require_array("image") else {
        return Ok(None);
    };
    let extent = image.extent();
    if extent.rank() != rank {
        scope.error(format!("'image' must be a {rank}D array, got extent {extent}"));
        return Ok(None);
    }
    let dt = image.data_type();
    if !dt.is_valid() {
        scope.error(format!("'image' has unsupported element type {dt}"));
        return Ok(None);
    }

    let params = scope.params();
    let wrap1 = WrapMode::from_name(&params.string("wrapMode1", "clampToEdge"));
    let wrap2 = WrapMode::from_name(&params.string("wrapMode2", "clampToEdge"));
    let [x, y, _] = extent.dims();
    let desc = TextureDesc {
        dims: [x as u32, y as u32, 1],
        channels: dt.components as u32,
        filter: TextureFilter::from_name(&params.string("filter", "linear")),
        wrap: [wrap1, wrap2, WrapMode::Clamp],
        normalized_coords: true,
    };
    let texels = image.to_f32_components()?;
    Ok(Some(DeviceTexture::new(scope.device(), &desc, &texels)?))
}

impl SceneObject for Sampler {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            let subtype = scope.header().subtype();
            let kind = match subtype {
                "image1D" => match image_texture(scope, 1)? {
                    Some(tex) => SamplerKind::Image1D(tex),
                    None => return Ok(None),
                },
                "image2D" => match image_texture(scope, 2)? {
                    Some(tex) => SamplerKind::Image2D(tex),
                    None => return Ok(None),
                },
                "primitive" => {
                    let Some(array) = scope.require_array("array") else {
                        return Ok(None);
                    };
                    let data = PrimIdSamplerData {
                        attr: attribute_ptr(&array)?,
                        offset: scope.params().get_or("inOffset", 0u32),
                        _pad: 0,
                    };
                    SamplerKind::Primitive { data, _array: array }
                }
                "transform" => SamplerKind::Transform,
                other => {
                    scope.warn(format!("unknown sampler subtype '{other}'"));
                    return Ok(None);
                }
            };

            let params = scope.params();
            let in_attribute = params.string("inAttribute", "attribute0");
            let attribute = match attribute_channel(&in_attribute) {
                Some(a) => a,
                None => {
                    scope.warn(format!("unknown inAttribute '{in_attribute}', sampler input disabled"));
                    -1
                }
            };

            let params = scope.params();
            Ok(Some(SamplerState {
                kind,
                attribute,
                in_transform: params.get_or("inTransform", Mat4::IDENTITY),
                in_offset: params.get_or("inOffset", Vec4::ZERO),
                out_transform: params.get_or("outTransform", Mat4::IDENTITY),
                out_offset: params.get_or("outOffset", Vec4::ZERO),
            }))
        })
    }
}
