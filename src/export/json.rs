use super::ExportError;
use std::io::Write;
use std::path::Path;

/// Write any serializable data structure as pretty JSON
pub fn write_json<T, W>(data: &T, mut writer: W) -> Result<(), ExportError>
where
    T: serde::Serialize + ?Sized,
    W: Write,
{
    let json_data = serde_json::to_string_pretty(data)
        .map_err(|e| ExportError::SerializationError(e.to_string()))?;

    writer.write_all(json_data.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    Ok(())
}

/// Export any serializable data structure to a JSON file
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<(), ExportError>
where
    T: serde::Serialize + ?Sized,
    P: AsRef<Path>,
{
    let file = std::fs::File::create(output_path)?;
    write_json(data, file)
}
