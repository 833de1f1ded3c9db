//! Fixed-width character rows.
//!
//! String columns are `char` variables shaped `[rows, width]`. Each row is
//! padded with NUL and ends at its first NUL on the way back, so trailing
//! spaces are part of the value.

use crate::error::{PointObsError, Result};
use crate::header::fit_width;
use netcdf::types::{NcTypeDescriptor, NcVariableType};

/// One element of a NetCDF `char` variable
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NcChar(i8);

// SAFETY: `NcChar` is a transparent single byte, matching NC_CHAR
unsafe impl NcTypeDescriptor for NcChar {
    fn type_descriptor() -> NcVariableType {
        NcVariableType::Char
    }
}

/// Pack `values` into consecutive `width`-byte rows, truncating any value
/// that does not fit
pub(crate) fn encode_rows<S: AsRef<str>>(values: &[S], width: usize, column: &str) -> Vec<NcChar> {
    let mut chars = vec![NcChar::default(); values.len() * width];
    for (row, value) in chars.chunks_exact_mut(width).zip(values) {
        let value = fit_width(value.as_ref(), width, column);
        for (slot, &byte) in row.iter_mut().zip(value.as_bytes()) {
            *slot = NcChar(byte as i8);
        }
    }
    chars
}

/// Split `width`-byte rows back into strings
pub(crate) fn decode_rows(chars: &[NcChar], width: usize, column: &str) -> Result<Vec<String>> {
    if width == 0 || chars.len() % width != 0 {
        return Err(PointObsError::format(format!(
            "{column} holds {} characters, not a multiple of its width {width}",
            chars.len()
        )));
    }
    chars
        .chunks_exact(width)
        .map(|row| {
            let bytes: Vec<u8> = row
                .iter()
                .map(|c| c.0 as u8)
                .take_while(|&b| b != 0)
                .collect();
            String::from_utf8(bytes)
                .map_err(|e| PointObsError::format(format!("{column} row is not UTF-8: {e}")))
        })
        .collect()
}
