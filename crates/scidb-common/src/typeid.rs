//! SciDB primitive type-id helpers.
//!
//! SciDB identifies cell types by short lowercase names ("uint8",
//! "double", ...). The shim serializes binary results using these
//! names, so size and classification lookups happen all over the
//! client.

/// Size in bytes of one value of the given type, or `None` for types
/// the raster layer cannot handle (strings, datetimes, ...).
pub fn byte_len(type_id: &str) -> Option<usize> {
    match type_id {
        "int8" | "uint8" | "char" | "bool" => Some(1),
        "int16" | "uint16" => Some(2),
        "int32" | "uint32" | "float" => Some(4),
        "int64" | "uint64" | "double" => Some(8),
        _ => None,
    }
}

/// Whether the type is one of the 8 signed/unsigned integer kinds
/// allowed for dimensions.
pub fn is_integer(type_id: &str) -> bool {
    matches!(
        type_id,
        "int8" | "int16" | "int32" | "int64" | "uint8" | "uint16" | "uint32" | "uint64"
    )
}

pub fn is_floating_point(type_id: &str) -> bool {
    matches!(type_id, "float" | "double")
}

/// Whether an attribute of this type can be mapped to a pixel type.
pub fn is_supported_pixel_type(type_id: &str) -> bool {
    is_integer(type_id) || is_floating_point(type_id)
}

/// Default no-data value used when an attribute carries no NODATA
/// metadata: the lowest representable value for signed integers, the
/// highest for unsigned ones, NaN for floating point.
pub fn default_nodata(type_id: &str) -> Option<f64> {
    match type_id {
        "int8" => Some(f64::from(i8::MIN)),
        "int16" => Some(f64::from(i16::MIN)),
        "int32" => Some(f64::from(i32::MIN)),
        "int64" => Some(i64::MIN as f64),
        "uint8" => Some(f64::from(u8::MAX)),
        "uint16" => Some(f64::from(u16::MAX)),
        "uint32" => Some(f64::from(u32::MAX)),
        "uint64" => Some(u64::MAX as f64),
        "float" | "double" => Some(f64::NAN),
        _ => None,
    }
}

/// The default no-data value rendered as an AFL literal.
pub fn default_nodata_literal(type_id: &str) -> Option<String> {
    default_nodata(type_id).map(|v| {
        if v.is_nan() {
            "nan".to_string()
        } else {
            format!("{}", v as i128)
        }
    })
}
