//! XML Metadata Parser Module
//!
//! XLSX内部のXMLファイルから、calamineで取得不可能な情報を抽出するモジュール。
//! アクティブシート（`workbookView/@activeTab`）と1904年エポック判定を提供します。

use std::io::{Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::XlsxBulkError;
use crate::security::{validate_zip_path, SecurityConfig};

/// ワークブックレベルのメタデータ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct WorkbookMetadata {
    /// アクティブシートのインデックス（`<sheets>`内の順序）
    pub active_tab: usize,
    /// 1904年エポックを使用するかどうか
    pub is_1904: bool,
}

impl WorkbookMetadata {
    /// XLSXファイル（ZIPアーカイブ）からメタデータを解析
    ///
    /// アーカイブ全体に対してファイル数・サイズ・パスのセキュリティチェックを行ってから、
    /// `xl/workbook.xml`を読み込みます。
    pub fn parse<R: Read + Seek>(
        xlsx_reader: R,
        security_config: &SecurityConfig,
    ) -> Result<Self, XlsxBulkError> {
        let mut archive = ZipArchive::new(xlsx_reader)?;

        if archive.len() > security_config.max_file_count {
            return Err(XlsxBulkError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                archive.len(),
                security_config.max_file_count
            )));
        }

        let mut total_decompressed_size = 0u64;
        for i in 0..archive.len() {
            let file = archive.by_index(i)?;

            let file_name = file.name();
            validate_zip_path(file_name).map_err(|e| {
                XlsxBulkError::SecurityViolation(format!("Invalid ZIP path: {}", e))
            })?;

            let file_size = file.size();
            if file_size > security_config.max_file_size {
                return Err(XlsxBulkError::SecurityViolation(format!(
                    "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                    file_name, file_size, security_config.max_file_size
                )));
            }

            total_decompressed_size =
                total_decompressed_size
                    .checked_add(file_size)
                    .ok_or_else(|| {
                        XlsxBulkError::SecurityViolation(
                            "Total decompressed size calculation overflow".to_string(),
                        )
                    })?;

            if total_decompressed_size > security_config.max_decompressed_size {
                return Err(XlsxBulkError::SecurityViolation(format!(
                    "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                    total_decompressed_size, security_config.max_decompressed_size
                )));
            }
        }

        let mut workbook_file = match archive.by_name("xl/workbook.xml") {
            Ok(file) => file,
            // workbook.xmlが存在しない場合はcalamine側でエラーになる
            Err(_) => return Ok(Self::default()),
        };
        let mut xml_content = Vec::new();
        workbook_file.read_to_end(&mut xml_content)?;

        Self::parse_workbook_xml(&xml_content)
    }

    /// xl/workbook.xml の解析
    ///
    /// `<workbookPr date1904="1"/>`と`<workbookView activeTab="N"/>`を読み取ります。
    fn parse_workbook_xml(xml_content: &[u8]) -> Result<Self, XlsxBulkError> {
        let mut reader = Reader::from_reader(xml_content);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut metadata = Self::default();
        let mut seen_view = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"workbookPr" => {
                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| {
                                XlsxBulkError::Zip(format!("XML attribute error: {}", e))
                            })?;
                            if attr.key.local_name().as_ref() == b"date1904" {
                                let value = std::str::from_utf8(&attr.value)
                                    .map_err(|e| XlsxBulkError::Zip(e.to_string()))?;
                                metadata.is_1904 = value == "1" || value == "true";
                            }
                        }
                    }
                    // 複数のビューがある場合は最初のものを採用
                    b"workbookView" if !seen_view => {
                        seen_view = true;
                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| {
                                XlsxBulkError::Zip(format!("XML attribute error: {}", e))
                            })?;
                            if attr.key.local_name().as_ref() == b"activeTab" {
                                let value = std::str::from_utf8(&attr.value)
                                    .map_err(|e| XlsxBulkError::Zip(e.to_string()))?;
                                metadata.active_tab = value.trim().parse().unwrap_or(0);
                            }
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxBulkError::Zip(format!("XML parse error: {}", e))),
                _ => {}
            }
            buf.clear();
        }

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workbook_xml_active_tab() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <workbookPr/>
  <bookViews><workbookView xWindow="0" yWindow="0" activeTab="2"/></bookViews>
  <sheets><sheet name="A" sheetId="1"/><sheet name="B" sheetId="2"/><sheet name="C" sheetId="3"/></sheets>
</workbook>"#;
        let metadata = WorkbookMetadata::parse_workbook_xml(xml).unwrap();
        assert_eq!(metadata.active_tab, 2);
        assert!(!metadata.is_1904);
    }

    #[test]
    fn test_parse_workbook_xml_1904_prefixed() {
        let xml = br#"<x:workbook xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <x:workbookPr date1904="1"></x:workbookPr>
</x:workbook>"#;
        let metadata = WorkbookMetadata::parse_workbook_xml(xml).unwrap();
        assert!(metadata.is_1904);
        assert_eq!(metadata.active_tab, 0);
    }

    #[test]
    fn test_parse_rejects_non_zip() {
        let result = WorkbookMetadata::parse(
            std::io::Cursor::new(b"not a zip".to_vec()),
            &SecurityConfig::default(),
        );
        assert!(matches!(result, Err(XlsxBulkError::Zip(_))));
    }
}
