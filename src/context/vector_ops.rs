//! Fixed-size numeric reads and writes: colors, vectors, quaternions,
//! angles, matrices. These all funnel through "N numbers in whatever array
//! representation is present", so a value written as one aggregate can be
//! read back as another of the same arity.

use crate::context::Context;
use crate::node::compact::{self, CompactSource};
use crate::node::{NodeHandle, Repr};
use crate::types::geom::{Color32, Matrix3x4, QAngle, Quaternion, Vec2, Vec3, Vec4};
use crate::types::SubType;
use crate::utils;

/// Whitespace-separated numeric tokens, at most `dest.len()` of them.
/// Returns how many were written.
fn parse_i32_tokens(text: &str, dest: &mut [i32]) -> usize {
    let mut written = 0;
    for token in text.split_whitespace() {
        if written == dest.len() {
            break;
        }
        match utils::parse_i64(token) {
            Some(value) => {
                dest[written] = value as i32;
                written += 1;
            }
            None => break,
        }
    }
    written
}

fn parse_f32_tokens(text: &str, dest: &mut [f32]) -> usize {
    let mut written = 0;
    for token in text.split_whitespace() {
        if written == dest.len() {
            break;
        }
        match utils::parse_f64(token) {
            Some(value) => {
                dest[written] = value as f32;
                written += 1;
            }
            None => break,
        }
    }
    written
}

impl Context {
    /// Reads exactly `dest.len()` integers out of any array representation
    /// (or a whitespace-separated string), widening narrower element types.
    /// Unfilled slots are zeroed; returns `true` only when the source had
    /// exactly as many elements as requested.
    pub fn read_array_i32(&self, handle: NodeHandle, dest: &mut [i32]) -> bool {
        let source_len = match self.try_node(handle) {
            Some(node) => match &node.repr {
                Repr::ArrayFull(array) => {
                    let handles = self.arrays.get(*array).map_or(&[][..], |c| c.handles());
                    for (slot, &element) in dest.iter_mut().zip(handles) {
                        *slot = self.try_node(element).map_or(0, |n| n.get_i32(0));
                    }
                    handles.len()
                }
                repr => match compact::read_compact_i32(repr, dest) {
                    Some(len) => len,
                    None => node
                        .get_string()
                        .map_or(0, |text| parse_i32_tokens(text, dest)),
                },
            },
            None => 0,
        };

        let filled = source_len.min(dest.len());
        for slot in dest[filled..].iter_mut() {
            *slot = 0;
        }
        source_len == dest.len()
    }

    /// Float counterpart of [`read_array_i32`](Self::read_array_i32).
    pub fn read_array_f32(&self, handle: NodeHandle, dest: &mut [f32]) -> bool {
        let source_len = match self.try_node(handle) {
            Some(node) => match &node.repr {
                Repr::ArrayFull(array) => {
                    let handles = self.arrays.get(*array).map_or(&[][..], |c| c.handles());
                    for (slot, &element) in dest.iter_mut().zip(handles) {
                        *slot = self.try_node(element).map_or(0.0, |n| n.get_f32(0.0));
                    }
                    handles.len()
                }
                repr => match compact::read_compact_f32(repr, dest) {
                    Some(len) => len,
                    None => node
                        .get_string()
                        .map_or(0, |text| parse_f32_tokens(text, dest)),
                },
            },
            None => 0,
        };

        let filled = source_len.min(dest.len());
        for slot in dest[filled..].iter_mut() {
            *slot = 0.0;
        }
        source_len == dest.len()
    }

    // ---- color ---------------------------------------------------------

    /// Reads a color from a 4-element (RGBA) or 3-element (RGB, alpha 255)
    /// array; `default` when neither arity matches.
    pub fn get_color(&self, handle: NodeHandle, default: Color32) -> Color32 {
        let mut rgba = [0i32; 4];
        if self.read_array_i32(handle, &mut rgba) {
            return Color32::new(rgba[0] as u8, rgba[1] as u8, rgba[2] as u8, rgba[3] as u8);
        }
        let mut rgb = [0i32; 3];
        if self.read_array_i32(handle, &mut rgb) {
            return Color32::new(rgb[0] as u8, rgb[1] as u8, rgb[2] as u8, 255);
        }
        default
    }

    /// Stores a color as a compact byte array, dropping the alpha element
    /// when it is 255.
    pub fn set_color(&mut self, handle: NodeHandle, color: Color32) {
        let bytes = color.as_array();
        let stored: &[u8] = if color.a == 255 { &bytes[..3] } else { &bytes };
        self.install_u8_array(handle, stored, SubType::Color32);
    }

    // ---- float aggregates ----------------------------------------------

    pub fn get_vec2(&self, handle: NodeHandle, default: Vec2) -> Vec2 {
        let mut v = [0f32; 2];
        if self.read_array_f32(handle, &mut v) {
            Vec2::from_array(v)
        } else {
            default
        }
    }

    pub fn get_vec3(&self, handle: NodeHandle, default: Vec3) -> Vec3 {
        let mut v = [0f32; 3];
        if self.read_array_f32(handle, &mut v) {
            Vec3::from_array(v)
        } else {
            default
        }
    }

    pub fn get_vec4(&self, handle: NodeHandle, default: Vec4) -> Vec4 {
        let mut v = [0f32; 4];
        if self.read_array_f32(handle, &mut v) {
            Vec4::from_array(v)
        } else {
            default
        }
    }

    pub fn get_quaternion(&self, handle: NodeHandle, default: Quaternion) -> Quaternion {
        let mut v = [0f32; 4];
        if self.read_array_f32(handle, &mut v) {
            Quaternion::from_array(v)
        } else {
            default
        }
    }

    pub fn get_qangle(&self, handle: NodeHandle, default: QAngle) -> QAngle {
        let mut v = [0f32; 3];
        if self.read_array_f32(handle, &mut v) {
            QAngle::from_array(v)
        } else {
            default
        }
    }

    pub fn get_matrix3x4(&self, handle: NodeHandle, default: Matrix3x4) -> Matrix3x4 {
        let mut v = [0f32; 12];
        if self.read_array_f32(handle, &mut v) {
            Matrix3x4::from_array(v)
        } else {
            default
        }
    }

    fn set_f32_aggregate(&mut self, handle: NodeHandle, values: &[f32], subtype: SubType) {
        self.install_f32_array(handle, CompactSource::Copied(values), subtype);
    }

    pub fn set_vec2(&mut self, handle: NodeHandle, value: Vec2) {
        self.set_f32_aggregate(handle, &value.to_array(), SubType::Vector2D);
    }

    pub fn set_vec3(&mut self, handle: NodeHandle, value: Vec3) {
        self.set_f32_aggregate(handle, &value.to_array(), SubType::Vector);
    }

    pub fn set_vec4(&mut self, handle: NodeHandle, value: Vec4) {
        self.set_f32_aggregate(handle, &value.to_array(), SubType::Vector4D);
    }

    pub fn set_quaternion(&mut self, handle: NodeHandle, value: Quaternion) {
        self.set_f32_aggregate(handle, &value.to_array(), SubType::Quaternion);
    }

    pub fn set_qangle(&mut self, handle: NodeHandle, value: QAngle) {
        self.set_f32_aggregate(handle, &value.to_array(), SubType::QAngle);
    }

    pub fn set_matrix3x4(&mut self, handle: NodeHandle, value: Matrix3x4) {
        self.set_f32_aggregate(handle, &value.to_array(), SubType::Matrix3x4);
    }
}
