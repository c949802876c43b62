//! The shim client facade.
//!
//! One [`ShimClient`] holds the connection parameters, the blocking
//! transport and the negotiated protocol state (version, auth token,
//! spacetime extension presence). Every public operation opens a
//! session, runs its queries and releases the session on all exit
//! paths.

use crate::afl;
use crate::decode;
use crate::http::{Transport, ENDPOINT_READ_BYTES, ENDPOINT_UPLOAD_FILE, ENDPOINT_VERSION};
use crate::table::{strip_quotes, TextTable};
use crate::version::{Dialect, ShimVersion};
use scidb_common::schema::Metadata;
use scidb_common::{
    typeid, ArrayDesc, AttributeStats, ConnectionParameters, CreationParameters,
    QueryParameters, SciDBArray, SciDBAttribute, SciDBDimension, ShimError, ShimResult,
    SpatialReference, TemporalReference, TileWindow,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Tile reads extract with `subarray` rather than shifted `between`.
const READ_WITH_SUBARRAY: bool = true;

/// Tile reads merge with a default-filled array so sparse cells come
/// back as no-data instead of being dropped from the binary stream.
const READ_FILL_EMPTY: bool = true;

/// Client for one shim gateway.
pub struct ShimClient {
    pub(crate) params: ConnectionParameters,
    pub(crate) transport: Transport,
    pub(crate) version: Option<ShimVersion>,
    pub(crate) has_spacetime: Option<bool>,
    pub(crate) auth: Option<String>,
}

impl std::fmt::Debug for ShimClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShimClient")
            .field("base_url", &self.transport.base_url())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl ShimClient {
    pub fn new(params: ConnectionParameters) -> ShimResult<Self> {
        let transport = Transport::new(&params)?;
        Ok(Self {
            params,
            transport,
            version: None,
            has_spacetime: None,
            auth: None,
        })
    }

    /// Raw version string of the gateway; doubles as the connection
    /// test since `/version` needs no session or auth.
    pub fn test_connection(&mut self) -> ShimResult<String> {
        let body = self.transport.get_text(ENDPOINT_VERSION, &[])?;
        Ok(body.trim().to_string())
    }

    /// Parsed gateway version, fetched once and cached.
    pub fn version(&mut self) -> ShimResult<ShimVersion> {
        if let Some(v) = self.version {
            return Ok(v);
        }
        let raw = self.test_connection()?;
        let v = ShimVersion::parse(&raw)?;
        info!(version = %v, "Connected to shim");
        self.version = Some(v);
        Ok(v)
    }

    pub fn dialect(&mut self) -> ShimResult<Dialect> {
        Ok(Dialect::for_version(self.version()?))
    }

    /// Whether the spacetime extension is loaded on the backend,
    /// probed once per client via the library list.
    pub fn has_spacetime(&mut self) -> ShimResult<bool> {
        if let Some(v) = self.has_spacetime {
            return Ok(v);
        }
        let bytes = self.query_binary(&afl::spacetime_probe(), "(uint64)")?;
        let present = decode::decode_u64(&bytes)? > 0;
        if !present {
            warn!("Spacetime extension not loaded, reference metadata unavailable");
        }
        self.has_spacetime = Some(present);
        Ok(present)
    }

    // --- query plumbing -------------------------------------------------

    pub(crate) fn execute_query(
        &mut self,
        session: i64,
        query: &str,
        save: Option<&str>,
    ) -> ShimResult<()> {
        debug!(session, query, "Executing query");
        let mut q = vec![("id", session.to_string()), ("query", query.to_string())];
        if let Some(save) = save {
            q.push(("save", save.to_string()));
        }
        let q = self.auth_query(q);
        self.transport
            .get_text(crate::http::ENDPOINT_EXECUTE_QUERY, &q)
            .map_err(|e| match e {
                ShimError::HttpStatus { .. } => ShimError::QueryFailed(query.to_string()),
                other => other,
            })?;
        Ok(())
    }

    pub(crate) fn read_text(&mut self, session: i64) -> ShimResult<String> {
        let q = self.auth_query(vec![("id", session.to_string()), ("n", "0".to_string())]);
        self.transport.get_text(ENDPOINT_READ_BYTES, &q)
    }

    pub(crate) fn read_binary(&mut self, session: i64) -> ShimResult<Vec<u8>> {
        let q = self.auth_query(vec![("id", session.to_string()), ("n", "0".to_string())]);
        self.transport.get_binary(ENDPOINT_READ_BYTES, &q)
    }

    /// Run a query saved as CSV and return the response body.
    pub fn query_text(&mut self, query: &str) -> ShimResult<String> {
        self.with_session(|c, id| {
            c.execute_query(id, query, Some("csv"))?;
            c.read_text(id)
        })
    }

    /// Run a query saved as CSV and parse the result table.
    pub fn query_table(&mut self, query: &str) -> ShimResult<TextTable> {
        let header = self.dialect()?.csv_header;
        let body = self.query_text(query)?;
        Ok(TextTable::new(body, header))
    }

    /// Like [`Self::query_table`] with the quote-comma-quote column
    /// separator used for reference metadata rows.
    fn query_table_quoted(&mut self, query: &str) -> ShimResult<TextTable> {
        let header = self.dialect()?.csv_header;
        let body = self.query_text(query)?;
        Ok(TextTable::with_separators(body, "','", "\n", header))
    }

    /// Run a query with a binary save format and return the raw bytes.
    pub fn query_binary(&mut self, query: &str, save: &str) -> ShimResult<Vec<u8>> {
        let save = save.to_string();
        self.with_session(move |c, id| {
            c.execute_query(id, query, Some(&save))?;
            c.read_binary(id)
        })
    }

    /// Run a query for its side effect only.
    pub fn execute(&mut self, query: &str) -> ShimResult<()> {
        self.with_session(|c, id| c.execute_query(id, query, None))
    }

    // --- catalog --------------------------------------------------------

    pub fn array_exists(&mut self, name: &str) -> ShimResult<bool> {
        let bytes = self.query_binary(&afl::array_count(name), "(int64)")?;
        Ok(decode::decode_i64(&bytes)? > 0)
    }

    /// Full description of an array: schema, references, metadata.
    pub fn describe_array(&mut self, name: &str) -> ShimResult<ArrayDesc> {
        if !self.array_exists(name)? {
            return Err(ShimError::ArrayUnknown(name.to_string()));
        }

        let mut array = SciDBArray {
            name: name.to_string(),
            attrs: self.fetch_attributes(name)?,
            dims: self.fetch_dimensions(name)?,
            metadata: BTreeMap::new(),
        };

        let spacetime = self.has_spacetime()?;
        let setting = if spacetime {
            self.fetch_setting(name)?
        } else {
            None
        };

        if spacetime {
            array.metadata = self.fetch_array_metadata_domains(name)?;
            for attr in &mut array.attrs {
                let md = self.get_attribute_metadata(name, &attr.name, "")?;
                if !md.is_empty() {
                    let _ = attr.metadata.insert(String::new(), md);
                }
            }
        }

        match setting.as_deref() {
            None => Ok(ArrayDesc::Plain(array)),
            Some("s") => {
                let srs = self.fetch_srs(name)?;
                Ok(ArrayDesc::Spatial { array, srs })
            }
            Some("st") => {
                let srs = self.fetch_srs(name)?;
                match self.fetch_trs(name) {
                    Ok(trs) => Ok(ArrayDesc::SpatioTemporal { array, srs, trs }),
                    Err(e) => {
                        // A missing temporal reference degrades the
                        // array to plain spatial rather than failing.
                        warn!(array = name, error = %e, "No usable temporal reference");
                        Ok(ArrayDesc::Spatial { array, srs })
                    }
                }
            }
            Some(other) => Err(ShimError::UnknownSetting(
                name.to_string(),
                other.to_string(),
            )),
        }
    }

    fn fetch_attributes(&mut self, name: &str) -> ShimResult<Vec<SciDBAttribute>> {
        let table = self.query_table(&afl::attributes_of(name))?;
        let mut attrs = Vec::with_capacity(table.nrow());
        for row in 0..table.nrow() {
            let attr_name = strip_quotes(table.cell(row, 0)?).to_string();
            let type_id = strip_quotes(table.cell(row, 1)?).to_string();
            let nullable: bool = table.get(row, 2)?;
            if !typeid::is_supported_pixel_type(&type_id) {
                warn!(
                    array = name,
                    attribute = attr_name,
                    type_id,
                    "Dropping attribute with unsupported pixel type"
                );
                continue;
            }
            attrs.push(SciDBAttribute::new(attr_name, type_id, nullable));
        }
        if attrs.is_empty() {
            return Err(ShimError::NoUsableAttributes(name.to_string()));
        }
        Ok(attrs)
    }

    fn fetch_dimensions(&mut self, name: &str) -> ShimResult<Vec<SciDBDimension>> {
        let table = self.query_table(&afl::dimensions_of(name))?;
        let mut dims = Vec::with_capacity(table.nrow());
        for row in 0..table.nrow() {
            let mut dim = SciDBDimension {
                name: strip_quotes(table.cell(row, 0)?).to_string(),
                low: table.get(row, 1)?,
                high: table.get(row, 2)?,
                type_id: strip_quotes(table.cell(row, 3)?).to_string(),
                chunk_size: table.get(row, 4)?,
                start: table.get(row, 5)?,
                length: table.get(row, 6)?,
            };
            if !typeid::is_integer(&dim.type_id) {
                return Err(ShimError::NonIntegerDimension {
                    name: dim.name,
                    type_id: dim.type_id,
                });
            }
            // Unspecified bounds come back as the dimension index
            // sentinel and are re-derived from start and length.
            if dim.has_unspecified_bounds() {
                dim.low = dim.start;
                dim.high = dim.start + dim.length - 1;
            }
            dims.push(dim);
        }
        Ok(dims)
    }

    /// Spacetime catalog tag of an array, `None` when unregistered.
    fn fetch_setting(&mut self, name: &str) -> ShimResult<Option<String>> {
        let table = self.query_table(&afl::array_setting(name))?;
        if table.nrow() == 0 {
            return Ok(None);
        }
        Ok(Some(strip_quotes(table.cell(0, 1)?).to_string()))
    }

    fn fetch_srs(&mut self, name: &str) -> ShimResult<SpatialReference> {
        let srs = self
            .query_table_quoted(&afl::srs_of(name))
            .ok()
            .and_then(|t| srs_from_table(name, &t));
        Ok(srs.unwrap_or_else(|| {
            warn!(array = name, "No usable spatial reference stored, using defaults");
            SpatialReference::default()
        }))
    }

    fn fetch_trs(&mut self, name: &str) -> ShimResult<TemporalReference> {
        let table = self.query_table(&afl::trs_of(name))?;
        if table.nrow() == 0 {
            return Err(ShimError::MalformedReference(name.to_string()));
        }
        let t0_raw = strip_quotes(table.cell(0, 1)?).to_string();
        let dt_raw = strip_quotes(table.cell(0, 2)?).to_string();
        let t0 = scidb_common::temporal::parse_datetime(&t0_raw)
            .map_err(|_| ShimError::MalformedReference(name.to_string()))?;
        let dt = dt_raw
            .parse()
            .map_err(|_| ShimError::MalformedReference(name.to_string()))?;
        Ok(TemporalReference {
            tdim: strip_quotes(table.cell(0, 0)?).to_string(),
            t0,
            dt,
        })
    }

    // --- tiles ----------------------------------------------------------

    /// Read one band's pixels over a window as packed little-endian
    /// cells in row-major order.
    pub fn read_tile(
        &mut self,
        desc: &ArrayDesc,
        band: usize,
        window: &TileWindow,
        query: &QueryParameters,
        creation: &CreationParameters,
    ) -> ShimResult<Vec<u8>> {
        let base = desc.base();
        let attr = base.attrs.get(band).ok_or(ShimError::BandOutOfRange {
            band,
            available: base.attrs.len(),
        })?;
        self.check_window(desc, window)?;

        let t_index = resolve_temporal_index(desc, query, creation);
        let read = afl::tile_read(
            desc,
            band,
            window,
            READ_WITH_SUBARRAY,
            READ_FILL_EMPTY,
            t_index,
        )?;
        let bytes = self.query_binary(&read, &afl::tile_save_spec(&attr.type_id))?;

        let expected = window.cells() as usize * attr.byte_len().unwrap_or(0);
        if bytes.len() != expected {
            return Err(ShimError::TileSizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }

    /// Upload one tile buffer and insert it into the array's temporary
    /// ingest counterpart.
    ///
    /// The buffer interleaves all attributes per pixel in declared
    /// order, row-major over the window.
    pub fn write_tile(
        &mut self,
        desc: &ArrayDesc,
        window: &TileWindow,
        data: &[u8],
    ) -> ShimResult<()> {
        self.check_window(desc, window)?;
        let expected = window.cells() as usize * desc.base().pixel_bytes();
        if data.len() != expected {
            return Err(ShimError::TileSizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        self.with_session(|c, id| {
            let q = c.auth_query(vec![("id", id.to_string())]);
            let body = c
                .transport
                .post_multipart(ENDPOINT_UPLOAD_FILE, &q, afl::UPLOAD_FILE_NAME, data)?;
            // The response body is the server-side path of the upload,
            // sanitized before splicing into query text.
            let remote = afl::sanitize_filename(body.trim());
            let insert = afl::tiled_ingest(desc, window, &remote)?;
            c.execute_query(id, &insert, None)
        })
    }

    fn check_window(&self, desc: &ArrayDesc, window: &TileWindow) -> ShimResult<()> {
        let x = desc
            .x_dim()
            .ok_or_else(|| ShimError::MissingDimension(desc.name().to_string(), 'x'))?;
        let y = desc
            .y_dim()
            .ok_or_else(|| ShimError::MissingDimension(desc.name().to_string(), 'y'))?;
        if !window.within(x, y) {
            return Err(ShimError::WindowOutOfBounds);
        }
        Ok(())
    }

    // --- array lifecycle ------------------------------------------------

    /// Create the temporary ingest counterpart of a new array.
    ///
    /// Tiles are written into the counterpart; [`Self::persist`] turns
    /// it into the final array with its reference metadata attached.
    pub fn create_array(
        &mut self,
        desc: &ArrayDesc,
        creation: &CreationParameters,
    ) -> ShimResult<()> {
        let base = desc.base();
        if base.name.is_empty() {
            return Err(ShimError::UnnamedArray);
        }
        if base.attrs.is_empty() {
            return Err(ShimError::CreateFailed(format!(
                "array '{}' declares no attributes",
                base.name
            )));
        }
        if self.array_exists(&base.name)? && !creation.kind.is_appendable() {
            return Err(ShimError::ArrayExists(base.name.clone()));
        }
        debug!(array = base.name, "Creating temporary ingest array");
        self.execute(&afl::create_temp_array(base))
    }

    /// Persist the temporary ingest counterpart into the final array,
    /// attach reference and key/value metadata and drop the counterpart.
    pub fn persist(&mut self, desc: &ArrayDesc) -> ShimResult<()> {
        let name = desc.name();
        let temp = format!("{}{}", name, afl::TEMP_ARRAY_SUFFIX);
        self.execute(&afl::store(&temp, name))?;
        self.update_srs(desc)?;
        self.update_trs(desc)?;
        self.push_metadata(desc)?;
        self.execute(&afl::remove(&temp))?;
        info!(array = name, "Array persisted");
        Ok(())
    }

    /// Insert one array's cells into another with coordinate remap,
    /// skipping cells that equal their declared no-data value.
    pub fn merge_into(&mut self, src: &ArrayDesc, dst: &ArrayDesc) -> ShimResult<()> {
        self.execute(&afl::overlay_ingest(src, dst))
    }

    pub fn remove_array(&mut self, name: &str) -> ShimResult<()> {
        self.execute(&afl::remove(name))
    }

    // --- reference metadata ---------------------------------------------

    /// Push the spatial reference, skipped with a warning when the
    /// extension is absent or the reference is undefined.
    pub fn update_srs(&mut self, desc: &ArrayDesc) -> ShimResult<()> {
        let Some(srs) = desc.srs() else {
            return Ok(());
        };
        if !srs.is_defined() {
            debug!(array = desc.name(), "No spatial reference to set");
            return Ok(());
        }
        if !self.has_spacetime()? {
            warn!(
                array = desc.name(),
                "Spacetime extension absent, spatial reference not stored"
            );
            return Ok(());
        }
        self.execute(&afl::set_srs(desc)?)
    }

    /// Push the temporal reference, with the same degradations as
    /// [`Self::update_srs`].
    pub fn update_trs(&mut self, desc: &ArrayDesc) -> ShimResult<()> {
        let Some(trs) = desc.trs() else {
            return Ok(());
        };
        if trs.dt.is_unset() {
            debug!(array = desc.name(), "No temporal resolution to set");
            return Ok(());
        }
        if !self.has_spacetime()? {
            warn!(
                array = desc.name(),
                "Spacetime extension absent, temporal reference not stored"
            );
            return Ok(());
        }
        self.execute(&afl::set_trs(desc)?)
    }

    // --- key/value metadata ---------------------------------------------

    pub fn get_array_metadata(&mut self, array: &str, domain: &str) -> ShimResult<Metadata> {
        let table = self.query_table(&afl::array_md_get(array, domain))?;
        table_to_metadata(&table)
    }

    pub fn set_array_metadata(&mut self, array: &str, kv: &Metadata) -> ShimResult<()> {
        if kv.is_empty() {
            return Ok(());
        }
        self.execute(&afl::array_md_set(array, kv))
    }

    pub fn get_attribute_metadata(
        &mut self,
        array: &str,
        attribute: &str,
        domain: &str,
    ) -> ShimResult<Metadata> {
        let table = self.query_table(&afl::attribute_md_get(array, attribute, domain))?;
        table_to_metadata(&table)
    }

    pub fn set_attribute_metadata(
        &mut self,
        array: &str,
        attribute: &str,
        kv: &Metadata,
    ) -> ShimResult<()> {
        if kv.is_empty() {
            return Ok(());
        }
        self.execute(&afl::attribute_md_set(array, attribute, kv))
    }

    fn fetch_array_metadata_domains(
        &mut self,
        name: &str,
    ) -> ShimResult<BTreeMap<String, Metadata>> {
        let md = self.get_array_metadata(name, "")?;
        let mut domains = BTreeMap::new();
        if !md.is_empty() {
            let _ = domains.insert(String::new(), md);
        }
        Ok(domains)
    }

    fn push_metadata(&mut self, desc: &ArrayDesc) -> ShimResult<()> {
        if !self.has_spacetime()? {
            return Ok(());
        }
        let base = desc.base();
        if let Some(md) = base.metadata.get("") {
            self.set_array_metadata(&base.name, md)?;
        }
        for attr in &base.attrs {
            if let Some(md) = attr.metadata.get("") {
                self.set_attribute_metadata(&base.name, &attr.name, md)?;
            }
        }
        Ok(())
    }

    // --- statistics -----------------------------------------------------

    /// Min/max/mean/stdev of one band, computed backend-side.
    pub fn get_attribute_stats(
        &mut self,
        desc: &ArrayDesc,
        band: usize,
    ) -> ShimResult<AttributeStats> {
        let base = desc.base();
        let attr = base.attrs.get(band).ok_or(ShimError::BandOutOfRange {
            band,
            available: base.attrs.len(),
        })?;
        let bytes = self.query_binary(
            &afl::stats(&base.name, &attr.name),
            "(double,double,double,double)",
        )?;
        decode::decode_stats(&bytes)
    }
}

impl Drop for ShimClient {
    fn drop(&mut self) {
        // Best effort: an expired token or dead gateway must not panic
        // a teardown path.
        if self.params.ssl && self.auth.is_some() {
            if let Err(e) = self.logout() {
                debug!(error = %e, "Logout on drop failed");
            }
        }
    }
}

/// Temporal slice index for a read: an explicit query index wins, then
/// a creation timestamp resolved through the temporal reference, then
/// index 0.
fn resolve_temporal_index(
    desc: &ArrayDesc,
    query: &QueryParameters,
    creation: &CreationParameters,
) -> i64 {
    let Some(trs) = desc.trs() else {
        return 0;
    };
    if let Some(i) = query.temporal_index {
        return i;
    }
    if let Some(ts) = creation.timestamp {
        return trs.index_at_datetime(ts);
    }
    debug!(
        array = desc.name(),
        "No temporal index given, reading slice 0"
    );
    0
}

/// Extract a spatial reference from one quote-separated probe row.
///
/// Column order: name,xdim,ydim,srtext,proj4text,A,auth_name,
/// auth_srid_str. Anything but exactly one 8-column row means no
/// usable reference is stored.
fn srs_from_table(name: &str, table: &TextTable) -> Option<SpatialReference> {
    if table.nrow() != 1 || table.ncol() != 8 {
        return None;
    }
    let affine_raw = strip_quotes(table.cell(0, 5).ok()?);
    let affine = affine_raw.parse().unwrap_or_else(|_| {
        warn!(
            array = name,
            raw = affine_raw,
            "Unparseable affine transform, using identity"
        );
        Default::default()
    });
    Some(SpatialReference {
        xdim: strip_quotes(table.cell(0, 1).ok()?).to_string(),
        ydim: strip_quotes(table.cell(0, 2).ok()?).to_string(),
        srtext: strip_quotes(table.cell(0, 3).ok()?).to_string(),
        proj4text: strip_quotes(table.cell(0, 4).ok()?).to_string(),
        auth_name: strip_quotes(table.cell(0, 6).ok()?).to_string(),
        auth_srid: strip_quotes(table.cell(0, 7).ok()?)
            .trim()
            .parse()
            .unwrap_or(0),
        affine,
    })
}

fn table_to_metadata(table: &TextTable) -> ShimResult<Metadata> {
    let mut md = Metadata::new();
    for row in 0..table.nrow() {
        let key = strip_quotes(table.cell(row, 0)?).to_string();
        let value = strip_quotes(table.cell(row, 1)?).to_string();
        let _ = md.insert(key, value);
    }
    Ok(md)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scidb_common::ArrayKind;
    use std::collections::BTreeMap;

    fn dim(name: &str, low: i64, high: i64) -> SciDBDimension {
        SciDBDimension {
            name: name.to_string(),
            low,
            high,
            type_id: "int64".to_string(),
            chunk_size: 256,
            start: low,
            length: high - low + 1,
        }
    }

    fn plain_desc() -> ArrayDesc {
        ArrayDesc::Plain(SciDBArray {
            name: "a".to_string(),
            attrs: vec![SciDBAttribute::new("band1", "uint8", false)],
            dims: vec![dim("y", 0, 9), dim("x", 0, 9)],
            metadata: BTreeMap::new(),
        })
    }

    fn offline_client() -> ShimClient {
        ShimClient::new(ConnectionParameters {
            host: "localhost".to_string(),
            port: 1,
            ssl: false,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_read_tile_rejects_bad_band_before_network() {
        let mut c = offline_client();
        let err = c
            .read_tile(
                &plain_desc(),
                5,
                &TileWindow::new(0, 0, 1, 1),
                &QueryParameters::default(),
                &CreationParameters::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ShimError::BandOutOfRange {
                band: 5,
                available: 1
            }
        ));
    }

    #[test]
    fn test_read_tile_rejects_bad_window_before_network() {
        let mut c = offline_client();
        let err = c
            .read_tile(
                &plain_desc(),
                0,
                &TileWindow::new(0, 0, 50, 50),
                &QueryParameters::default(),
                &CreationParameters::default(),
            )
            .unwrap_err();
        assert!(matches!(err, ShimError::WindowOutOfBounds));
    }

    #[test]
    fn test_write_tile_rejects_short_buffer() {
        let mut c = offline_client();
        // 2x2 window of uint8 needs 4 bytes.
        let err = c
            .write_tile(&plain_desc(), &TileWindow::new(0, 0, 1, 1), &[0u8; 3])
            .unwrap_err();
        assert!(matches!(
            err,
            ShimError::TileSizeMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_create_rejects_unnamed_and_empty() {
        let mut c = offline_client();
        let mut desc = plain_desc();
        desc.base_mut().name.clear();
        let creation = CreationParameters {
            kind: ArrayKind::Array,
            ..Default::default()
        };
        assert!(matches!(
            c.create_array(&desc, &creation),
            Err(ShimError::UnnamedArray)
        ));

        let mut desc = plain_desc();
        desc.base_mut().attrs.clear();
        assert!(matches!(
            c.create_array(&desc, &creation),
            Err(ShimError::CreateFailed(_))
        ));
    }

    #[test]
    fn test_short_srs_row_means_no_reference() {
        // A truncated probe row must not surface a cell error; it is
        // the same degradation as an empty result.
        let t = TextTable::with_separators("'landsat','y','x'", "','", "\n", false);
        assert!(srs_from_table("landsat", &t).is_none());

        let empty = TextTable::with_separators("", "','", "\n", false);
        assert!(srs_from_table("landsat", &empty).is_none());
    }

    #[test]
    fn test_full_srs_row_parses() {
        let t = TextTable::with_separators(
            "'landsat','x','y','PROJCS[\"utm\",UNIT[\"m\",1]]','+proj=utm','x0=1,y0=2','EPSG','32632'",
            "','",
            "\n",
            false,
        );
        let srs = srs_from_table("landsat", &t).unwrap();
        assert_eq!(srs.xdim, "x");
        assert_eq!(srs.srtext, "PROJCS[\"utm\",UNIT[\"m\",1]]");
        assert_eq!(srs.auth_name, "EPSG");
        assert_eq!(srs.auth_srid, 32632);
        assert_eq!(srs.affine.x0, 1.0);
        assert!(srs.is_defined());
    }

    #[test]
    fn test_reference_set_skipped_without_extension() {
        // Port 1 has no listener: reaching the network would error, so
        // Ok proves the query was never issued.
        let mut c = offline_client();
        c.has_spacetime = Some(false);

        let spatial = ArrayDesc::Spatial {
            array: plain_desc().base().clone(),
            srs: SpatialReference {
                srtext: "PROJCS[\"utm\"]".to_string(),
                ..Default::default()
            },
        };
        c.update_srs(&spatial).unwrap();

        let st = ArrayDesc::SpatioTemporal {
            array: plain_desc().base().clone(),
            srs: SpatialReference::default(),
            trs: TemporalReference {
                tdim: "t".to_string(),
                t0: chrono::DateTime::UNIX_EPOCH,
                dt: "P1D".parse().unwrap(),
            },
        };
        c.update_trs(&st).unwrap();
    }

    #[test]
    fn test_resolve_temporal_index() {
        let q = QueryParameters::default();
        let creation = CreationParameters::default();
        assert_eq!(resolve_temporal_index(&plain_desc(), &q, &creation), 0);

        let desc = ArrayDesc::SpatioTemporal {
            array: plain_desc().base().clone(),
            srs: SpatialReference::default(),
            trs: TemporalReference {
                tdim: "t".to_string(),
                t0: chrono::DateTime::UNIX_EPOCH,
                dt: "P1D".parse().unwrap(),
            },
        };
        let q = QueryParameters {
            temporal_index: Some(42),
        };
        assert_eq!(resolve_temporal_index(&desc, &q, &creation), 42);
    }
}
