//! AFL query construction.
//!
//! Every operation family the client supports maps to one query shape
//! here. The functions are pure string builders: schema facts go in,
//! backend query text comes out. Validation of windows and band
//! indices happens in the client before any of these run.

use scidb_common::schema::Metadata;
use scidb_common::{typeid, ArrayDesc, SciDBArray, ShimError, ShimResult, TileWindow};
use std::fmt::Write as _;
use tracing::warn;

/// Suffix of the temporary ingest counterpart of an array.
pub const TEMP_ARRAY_SUFFIX: &str = "_temp";

/// Backend library whose presence marks the spacetime extension.
pub const SPACETIME_LIBRARY: &str = "libscidb4geo.so";

/// Client-side name for uploaded tile buffers.
pub const UPLOAD_FILE_NAME: &str = "raster_tile.bin";

/// Attribute list of an array: name, type, nullability.
pub fn attributes_of(array: &str) -> String {
    format!("project(attributes({array}),name,type_id,nullable)")
}

/// Dimension list of an array.
pub fn dimensions_of(array: &str) -> String {
    format!("project(dimensions({array}),name,low,high,type,chunk_interval,start,length)")
}

/// Count of registered spacetime extension libraries.
///
/// An aggregate over the filtered library list always succeeds, unlike
/// probing the extension's own operators.
pub fn spacetime_probe() -> String {
    format!("aggregate(filter(list('libraries'), name='{SPACETIME_LIBRARY}'), count(name))")
}

/// Count of catalog arrays with an exact name match.
pub fn array_count(array: &str) -> String {
    format!("aggregate(filter(list('arrays'),name='{array}'),count(name))")
}

/// The spacetime catalog entry of an array, projecting its `setting` tag.
pub fn array_setting(array: &str) -> String {
    format!("project(filter(eo_arrays(), name='{array}'),name,setting)")
}

/// Spatial reference of an array.
///
/// The numeric authority code is re-projected through `string()` so
/// every column is a quoted string and the `','` separator splits
/// reliably even with commas inside the WKT.
pub fn srs_of(array: &str) -> String {
    format!(
        "project(apply(st_getsrs({array}),auth_srid_str,string(auth_srid)),\
         name,xdim,ydim,srtext,proj4text,A,auth_name,auth_srid_str)"
    )
}

/// Temporal reference of an array.
pub fn trs_of(array: &str) -> String {
    format!("project(st_gettrs({array}),tdim,t0,dt)")
}

/// Min/max/mean/stdev over one attribute.
pub fn stats(array: &str, attribute: &str) -> String {
    format!(
        "aggregate({array},min({attribute}),max({attribute}),avg({attribute}),stdev({attribute}))"
    )
}

pub fn remove(array: &str) -> String {
    format!("remove({array})")
}

/// Persist a source expression into a permanent target array.
pub fn store(src: &str, dst: &str) -> String {
    format!("store({src}, {dst})")
}

/// Array-level metadata in one domain.
pub fn array_md_get(array: &str, domain: &str) -> String {
    format!("project(filter(eo_getmd({array}),attribute='' and domain='{domain}'), key, value)")
}

pub fn array_md_set(array: &str, kv: &Metadata) -> String {
    let (keys, values) = join_kv(kv);
    format!("eo_setmd({array},'{keys}','{values}')")
}

/// Attribute-level metadata in one domain.
pub fn attribute_md_get(array: &str, attribute: &str, domain: &str) -> String {
    format!(
        "project(filter(eo_getmd({array}),attribute='{attribute}' and domain='{domain}'), key, value)"
    )
}

pub fn attribute_md_set(array: &str, attribute: &str, kv: &Metadata) -> String {
    let (keys, values) = join_kv(kv);
    format!("eo_setmd({array},'{attribute}','{keys}','{values}')")
}

fn join_kv(kv: &Metadata) -> (String, String) {
    let keys: Vec<&str> = kv.keys().map(String::as_str).collect();
    let values: Vec<&str> = kv.values().map(String::as_str).collect();
    (keys.join(","), values.join(","))
}

/// Push the spatial reference of an array to the backend.
pub fn set_srs(desc: &ArrayDesc) -> ShimResult<String> {
    let srs = desc
        .srs()
        .ok_or_else(|| ShimError::MalformedReference(desc.name().to_string()))?;
    let x = dim_of(desc, 'x')?;
    let y = dim_of(desc, 'y')?;
    Ok(format!(
        "st_setsrs({},'{}','{}','{}',{},'{}')",
        desc.name(),
        x.name,
        y.name,
        srs.auth_name,
        srs.auth_srid,
        srs.affine
    ))
}

/// Push the temporal reference of an array to the backend.
pub fn set_trs(desc: &ArrayDesc) -> ShimResult<String> {
    let trs = desc
        .trs()
        .ok_or_else(|| ShimError::MalformedReference(desc.name().to_string()))?;
    Ok(format!(
        "st_settrs({},'{}','{}','{}')",
        desc.name(),
        trs.tdim,
        trs.t0.format("%Y-%m-%dT%H:%M:%S"),
        trs.dt
    ))
}

/// `CREATE TEMP ARRAY` statement for the temporary ingest counterpart.
pub fn create_temp_array(base: &SciDBArray) -> String {
    format!(
        "CREATE TEMP ARRAY {}{} {}",
        base.name,
        TEMP_ARRAY_SUFFIX,
        base.schema_string()
    )
}

/// Binary save directive for one attribute's tile read.
pub fn tile_save_spec(type_id: &str) -> String {
    format!("({type_id})")
}

/// Subarray extraction of one attribute over a pixel window.
///
/// Shape selection: `subarray` (fixed bounds) or `between` (shifted
/// bounds) per `use_subarray`; the two spatial dimensions are
/// transposed when the x dimension is declared before the y dimension;
/// `empty_fill` merges with a default-filled synthetic array of the
/// same shape; nullable attributes are wrapped in a `substitute` that
/// replaces null cells with the attribute's no-data value.
pub fn tile_read(
    desc: &ArrayDesc,
    band: usize,
    window: &TileWindow,
    use_subarray: bool,
    empty_fill: bool,
    t_index: i64,
) -> ShimResult<String> {
    let base = desc.base();
    let attr = base.attrs.get(band).ok_or(ShimError::BandOutOfRange {
        band,
        available: base.attrs.len(),
    })?;
    let x = dim_of(desc, 'x')?;
    let y = dim_of(desc, 'y')?;
    let x_idx = desc.x_dim_index().unwrap_or(1);
    let y_idx = desc.y_dim_index().unwrap_or(0);
    let naval = attr.nodata_literal().unwrap_or_else(|| "0".to_string());
    let nullness = if attr.nullable { " NULL" } else { " NOT NULL" };

    // Spatio-temporal arrays are first sliced down to one time step.
    let source = match desc.trs() {
        Some(trs) => format!("slice({},{},{})", base.name, trs.tdim, t_index),
        None => base.name.clone(),
    };

    // The backend expects window coordinates in declared dimension
    // order; a y-before-x layout already matches the raster row/column
    // order, otherwise the result is transposed afterwards.
    let y_first = x_idx > y_idx;
    let (c0, c1, c2, c3) = if y_first {
        (window.y_min, window.x_min, window.y_max, window.x_max)
    } else {
        (window.x_min, window.y_min, window.x_max, window.y_max)
    };
    let op = if use_subarray { "subarray" } else { "between" };
    let extract = format!(
        "project({op}({source},{c0},{c1},{c2},{c3}),{attr})",
        attr = attr.name
    );

    let mut query = if !empty_fill {
        extract
    } else {
        // Merge with a synthetic default-filled array of identical
        // shape so cells absent from a sparse array become no-data.
        let (first, second) = if y_first { (y, x) } else { (x, y) };
        let (flen, slen) = if y_first {
            (window.height() - 1, window.width() - 1)
        } else {
            (window.width() - 1, window.height() - 1)
        };
        let fill = if use_subarray {
            format!(
                "build(<{a}:{t}{n}> [{fd}=0:{flen},{fc},0,{sd}=0:{slen},{sc},0],{naval})",
                a = attr.name,
                t = attr.type_id,
                n = nullness,
                fd = first.name,
                fc = first.chunk_size,
                sd = second.name,
                sc = second.chunk_size,
            )
        } else {
            format!(
                "between(build(<{a}:{t}{n}> [{fd}={fs}:{fe},{fc},0,{sd}={ss}:{se},{sc},0],{naval}),{c0},{c1},{c2},{c3})",
                a = attr.name,
                t = attr.type_id,
                n = nullness,
                fd = first.name,
                fs = first.start,
                fe = first.start + first.length - 1,
                fc = first.chunk_size,
                sd = second.name,
                ss = second.start,
                se = second.start + second.length - 1,
                sc = second.chunk_size,
            )
        };
        format!("merge({extract},{fill})")
    };

    if !y_first {
        query = format!("transpose({query})");
    }

    if attr.nullable {
        query = format!(
            "substitute({query}, build(<val:{t}>[i=0:0, 1, 0], {naval}))",
            t = attr.type_id
        );
    }

    Ok(query)
}

/// Ingest pipeline for an uploaded tile buffer.
///
/// `repart` is used only when the tile exactly covers the full declared
/// extent; the cheaper operator is not correct for partial windows.
pub fn tiled_ingest(
    desc: &ArrayDesc,
    window: &TileWindow,
    remote_file: &str,
) -> ShimResult<String> {
    let base = desc.base();
    let x_idx = desc
        .x_dim_index()
        .ok_or_else(|| ShimError::MissingDimension(base.name.clone(), 'x'))?;
    let y_idx = desc
        .y_dim_index()
        .ok_or_else(|| ShimError::MissingDimension(base.name.clone(), 'y'))?;

    // The uploaded buffer spans exactly the window, so the input
    // schema is the array's with bounds narrowed to it.
    let mut tile = base.clone();
    {
        let xd = &mut tile.dims[x_idx];
        xd.start = window.x_min;
        xd.low = window.x_min;
        xd.high = window.x_max;
        xd.length = window.width();
    }
    {
        let yd = &mut tile.dims[y_idx];
        yd.start = window.y_min;
        yd.low = window.y_min;
        yd.high = window.y_max;
        yd.length = window.height();
    }

    let input = format!(
        "input({}, '{}', -2, '{}')",
        tile.schema_string(),
        remote_file,
        base.format_string()
    );

    let full = window.covers_full_extent(&base.dims[x_idx], &base.dims[y_idx]);
    let reshaped = if full {
        format!("repart({}, {})", input, base.schema_string())
    } else {
        format!("redimension({}, {})", input, base.schema_string())
    };

    Ok(format!(
        "insert({}, {}{})",
        reshaped, base.name, TEMP_ARRAY_SUFFIX
    ))
}

/// Cross-array insert with coordinate remap.
///
/// The source carries synthetic `over_x`/`over_y`/`over_t` coordinate
/// attributes produced by the backend's overlay; the pipeline joins
/// them on, casts them to the destination's real dimension names,
/// redimensions with collisions ignored, and filters out cells whose
/// attribute values equal their declared no-data sentinel.
pub fn overlay_ingest(src: &ArrayDesc, dst: &ArrayDesc) -> String {
    let src_base = src.base();
    let dst_name = dst.name();

    let mut cast_schema = String::from("<");
    for a in &src_base.attrs {
        let _ = write!(
            cast_schema,
            "{}:{}{},",
            a.name,
            a.type_id,
            if a.nullable { " NULL" } else { "" }
        );
    }
    // Rename the overlay coordinate attributes to the destination's
    // dimension names. The overlay emits over_t even for purely
    // spatial destinations.
    let x_name = dst.x_dim().map(|d| d.name.as_str()).unwrap_or("x");
    let y_name = dst.y_dim().map(|d| d.name.as_str()).unwrap_or("y");
    let t_name = dst.t_dim().map(|d| d.name.as_str()).unwrap_or("t");
    let _ = write!(
        cast_schema,
        "{x_name}:int64 NULL, {y_name}:int64 NULL, {t_name}:int64 NULL>["
    );
    for (i, d) in src_base.dims.iter().enumerate() {
        if i > 0 {
            cast_schema.push_str(", ");
        }
        let _ = write!(
            cast_schema,
            "src_{}={}:{},{},0",
            d.name,
            d.low,
            d.high_or_star(),
            d.chunk_size
        );
    }
    cast_schema.push(']');

    let eo_over = format!("eo_over({},{})", src_base.name, dst_name);
    let join = format!("join({}, {})", src_base.name, eo_over);
    let cast = format!("cast({}, {})", join, cast_schema);
    // strict=false ignores cell collisions during the redimension.
    let redimension = format!("redimension({},{}, false)", cast, dst_name);

    let filtered = match nodata_predicate(src_base) {
        Some(predicate) => format!("filter({}, NOT ({}))", redimension, predicate),
        None => redimension,
    };

    format!("insert({}, {})", filtered, dst_name)
}

/// OR-chain of per-attribute no-data equality predicates.
///
/// Attributes without a declared sentinel are excluded; when every
/// attribute lacks one, no filter is applied at all.
fn nodata_predicate(array: &SciDBArray) -> Option<String> {
    let mut any_declared = false;
    let mut predicate = String::new();
    for a in &array.attrs {
        let Some(raw) = a.declared_nodata() else {
            continue;
        };
        any_declared = true;
        if typeid::is_integer(&a.type_id) {
            match raw.parse::<i64>() {
                Ok(v) => {
                    let _ = write!(predicate, "{} = {} OR ", a.name, v);
                }
                Err(_) => warn!(attribute = %a.name, value = raw, "Ignoring unparseable NODATA value"),
            }
        } else if typeid::is_floating_point(&a.type_id) {
            match raw.parse::<f64>() {
                Ok(v) => {
                    let _ = write!(predicate, "{} = {} OR ", a.name, v);
                }
                Err(_) => warn!(attribute = %a.name, value = raw, "Ignoring unparseable NODATA value"),
            }
        }
    }
    if any_declared {
        predicate.push_str("FALSE");
        Some(predicate)
    } else {
        None
    }
}

/// Strip every character outside [A-Za-z0-9/_.-] from a
/// backend-reported upload path before it is spliced into a query.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '.'))
        .collect()
}

fn dim_of(desc: &ArrayDesc, axis: char) -> ShimResult<&scidb_common::SciDBDimension> {
    let dim = match axis {
        'x' => desc.x_dim(),
        'y' => desc.y_dim(),
        _ => None,
    };
    dim.ok_or_else(|| ShimError::MissingDimension(desc.name().to_string(), axis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scidb_common::{SciDBAttribute, SciDBDimension, SpatialReference};
    use std::collections::BTreeMap;

    fn dim(name: &str, low: i64, high: i64, chunk: i64) -> SciDBDimension {
        SciDBDimension {
            name: name.to_string(),
            low,
            high,
            type_id: "int64".to_string(),
            chunk_size: chunk,
            start: low,
            length: high - low + 1,
        }
    }

    fn desc(nullable: bool) -> ArrayDesc {
        ArrayDesc::Spatial {
            array: SciDBArray {
                name: "chicago".to_string(),
                attrs: vec![SciDBAttribute::new("band1", "uint8", nullable)],
                dims: vec![dim("y", 0, 99, 32), dim("x", 0, 199, 32)],
                metadata: BTreeMap::new(),
            },
            srs: SpatialReference::default(),
        }
    }

    #[test]
    fn test_introspection_queries() {
        assert_eq!(
            attributes_of("a"),
            "project(attributes(a),name,type_id,nullable)"
        );
        assert_eq!(
            dimensions_of("a"),
            "project(dimensions(a),name,low,high,type,chunk_interval,start,length)"
        );
        assert_eq!(
            array_count("a"),
            "aggregate(filter(list('arrays'),name='a'),count(name))"
        );
        assert!(spacetime_probe().contains("libscidb4geo.so"));
    }

    #[test]
    fn test_tile_read_plain_subarray() {
        let q = tile_read(&desc(false), 0, &TileWindow::new(10, 20, 30, 40), true, false, 0)
            .unwrap();
        // y is declared first: no transpose, y-coordinates lead.
        assert_eq!(q, "project(subarray(chicago,20,10,40,30),band1)");
    }

    #[test]
    fn test_tile_read_between() {
        let q = tile_read(&desc(false), 0, &TileWindow::new(10, 20, 30, 40), false, false, 0)
            .unwrap();
        assert_eq!(q, "project(between(chicago,20,10,40,30),band1)");
    }

    #[test]
    fn test_tile_read_transposes_x_first_layout() {
        let mut d = desc(false);
        d.base_mut().dims.reverse();
        let q = tile_read(&d, 0, &TileWindow::new(10, 20, 30, 40), true, false, 0).unwrap();
        assert!(q.starts_with("transpose("));
        assert!(q.contains("subarray(chicago,10,20,30,40)"));
    }

    #[test]
    fn test_tile_read_empty_fill_merges_build() {
        let q = tile_read(&desc(false), 0, &TileWindow::new(0, 0, 9, 9), true, true, 0).unwrap();
        assert!(q.starts_with("merge(project(subarray("));
        assert!(q.contains("build(<band1:uint8 NOT NULL> [y=0:9,32,0,x=0:9,32,0],255)"));
    }

    #[test]
    fn test_tile_read_between_empty_fill_uses_declared_extent() {
        let q = tile_read(&desc(false), 0, &TileWindow::new(0, 0, 9, 9), false, true, 0).unwrap();
        assert!(q.contains("between(build(<band1:uint8 NOT NULL> [y=0:99,32,0,x=0:199,32,0],255),0,0,9,9)"));
    }

    #[test]
    fn test_tile_read_rejects_bad_band() {
        let err = tile_read(&desc(false), 3, &TileWindow::new(0, 0, 1, 1), true, false, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            ShimError::BandOutOfRange {
                band: 3,
                available: 1
            }
        ));
    }

    #[test]
    fn test_tile_read_nullable_substitutes_nodata() {
        let mut d = desc(true);
        d.base_mut().attrs[0]
            .metadata
            .entry(String::new())
            .or_default()
            .insert("NODATA".to_string(), "9999".to_string());
        let q = tile_read(&d, 0, &TileWindow::new(0, 0, 9, 9), true, false, 0).unwrap();
        assert!(q.starts_with("substitute("));
        assert!(q.ends_with("build(<val:uint8>[i=0:0, 1, 0], 9999))"));
    }

    #[test]
    fn test_tile_read_slices_temporal_arrays() {
        let d = ArrayDesc::SpatioTemporal {
            array: SciDBArray {
                name: "st".to_string(),
                attrs: vec![SciDBAttribute::new("v", "double", false)],
                dims: vec![dim("t", 0, 364, 1), dim("y", 0, 99, 32), dim("x", 0, 99, 32)],
                metadata: BTreeMap::new(),
            },
            srs: SpatialReference::default(),
            trs: scidb_common::TemporalReference {
                tdim: "t".to_string(),
                t0: chrono::DateTime::UNIX_EPOCH,
                dt: scidb_common::TemporalInterval::parse("P1D").unwrap(),
            },
        };
        let q = tile_read(&d, 0, &TileWindow::new(0, 0, 9, 9), true, false, 7).unwrap();
        assert!(q.contains("subarray(slice(st,t,7),"));
    }

    #[test]
    fn test_tiled_ingest_full_extent_uses_repart() {
        let d = desc(false);
        let q = tiled_ingest(&d, &TileWindow::new(0, 0, 199, 99), "/tmp/up.bin").unwrap();
        assert!(q.contains("repart("));
        assert!(!q.contains("redimension("));
        assert!(q.ends_with(", chicago_temp)"));
    }

    #[test]
    fn test_tiled_ingest_partial_extent_uses_redimension() {
        let d = desc(false);
        let q = tiled_ingest(&d, &TileWindow::new(0, 0, 99, 99), "/tmp/up.bin").unwrap();
        assert!(q.contains("redimension("));
        assert!(!q.contains("repart("));
        // The input schema is narrowed to the window.
        assert!(q.contains("x=0:99"));
    }

    #[test]
    fn test_overlay_ingest_filters_declared_nodata_only() {
        let mut src = desc(false);
        src.base_mut().attrs = vec![
            SciDBAttribute::new("a", "uint8", false),
            SciDBAttribute::new("b", "double", false),
        ];
        src.base_mut().attrs[0]
            .metadata
            .entry(String::new())
            .or_default()
            .insert("NODATA".to_string(), "255".to_string());
        let dst = desc(false);

        let q = overlay_ingest(&src, &dst);
        assert!(q.contains("eo_over(chicago,chicago)"));
        assert!(q.contains("redimension(cast(join("));
        assert!(q.contains(", false)"));
        assert!(q.contains("NOT (a = 255 OR FALSE)"));
        assert!(!q.contains("b ="));
    }

    #[test]
    fn test_overlay_ingest_without_sentinels_has_no_filter() {
        let src = desc(false);
        let dst = desc(false);
        let q = overlay_ingest(&src, &dst);
        assert!(!q.contains("filter("));
        // filter( appears nowhere, but the plain redimension insert does.
        assert!(q.starts_with("insert(redimension("));
    }

    #[test]
    fn test_overlay_cast_schema_renames_dimensions() {
        let src = desc(false);
        let dst = desc(false);
        let q = overlay_ingest(&src, &dst);
        assert!(q.contains("x:int64 NULL, y:int64 NULL, t:int64 NULL>"));
        assert!(q.contains("src_y=0:99,32,0, src_x=0:199,32,0"));
    }

    #[test]
    fn test_create_and_misc() {
        let d = desc(false);
        let q = create_temp_array(d.base());
        assert!(q.starts_with("CREATE TEMP ARRAY chicago_temp <band1:uint8>"));
        assert_eq!(remove("a"), "remove(a)");
        assert_eq!(store("s", "d"), "store(s, d)");
        assert_eq!(tile_save_spec("uint16"), "(uint16)");
        assert_eq!(
            stats("a", "band1"),
            "aggregate(a,min(band1),max(band1),avg(band1),stdev(band1))"
        );
    }

    #[test]
    fn test_metadata_queries() {
        let mut kv = Metadata::new();
        kv.insert("NODATA".to_string(), "255".to_string());
        kv.insert("UNIT".to_string(), "K".to_string());
        assert_eq!(
            array_md_set("a", &kv),
            "eo_setmd(a,'NODATA,UNIT','255,K')"
        );
        assert_eq!(
            attribute_md_set("a", "band1", &kv),
            "eo_setmd(a,'band1','NODATA,UNIT','255,K')"
        );
        assert_eq!(
            array_md_get("a", ""),
            "project(filter(eo_getmd(a),attribute='' and domain=''), key, value)"
        );
        assert_eq!(
            attribute_md_get("a", "band1", ""),
            "project(filter(eo_getmd(a),attribute='band1' and domain=''), key, value)"
        );
    }

    #[test]
    fn test_set_srs_query() {
        let mut d = desc(false);
        if let ArrayDesc::Spatial { srs, .. } = &mut d {
            srs.auth_name = "EPSG".to_string();
            srs.auth_srid = 4326;
            srs.srtext = "GEOGCS[...]".to_string();
        }
        let q = set_srs(&d).unwrap();
        assert!(q.starts_with("st_setsrs(chicago,'x','y','EPSG',4326,'x0=0,"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("/tmp/shim_file_1.bin\r\n"),
            "/tmp/shim_file_1.bin"
        );
        assert_eq!(sanitize_filename("a b;c|d"), "abcd");
    }
}
