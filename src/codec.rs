//! CSV Codec Module
//!
//! 区切り文字形式のテキストと行データ（文字列セルの並び）を相互変換するモジュール。
//! `csv`クレートでRFC 4180の引用符処理を行い、改行は`\n` / `\r\n` / `\r`の
//! いずれも行区切りとして扱います。
//!
//! `csv`クレートは1バイトの区切り文字しか扱えないため、非ASCIIの区切り文字は
//! 入力中に現れない制御文字（U+001F）に置き換えてから処理し、結果を元に戻します。

use std::borrow::Cow;

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

use crate::error::XlsxBulkError;

/// 非ASCII区切り文字の代替として使う区切りバイト（UNIT SEPARATOR）
const SURROGATE: u8 = 0x1F;
const SURROGATE_CHAR: char = '\u{1F}';

/// 区切り文字の内部表現
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    /// `csv`クレートにそのまま渡せる1バイト区切り
    Ascii(u8),
    /// 代替バイトを介して扱う非ASCII区切り
    Wide(char),
}

impl Delimiter {
    fn classify(delimiter: char) -> Result<Self, XlsxBulkError> {
        if matches!(delimiter, '"' | '\n' | '\r') || delimiter == SURROGATE_CHAR {
            return Err(XlsxBulkError::MalformedInput(format!(
                "unsupported delimiter {:?}",
                delimiter
            )));
        }
        if delimiter.is_ascii() {
            Ok(Delimiter::Ascii(delimiter as u8))
        } else {
            Ok(Delimiter::Wide(delimiter))
        }
    }

    fn byte(self) -> u8 {
        match self {
            Delimiter::Ascii(b) => b,
            Delimiter::Wide(_) => SURROGATE,
        }
    }
}

/// 区切り文字として使用できるかどうかを検証する
pub(crate) fn validate_delimiter(delimiter: char) -> Result<(), XlsxBulkError> {
    Delimiter::classify(delimiter).map(|_| ())
}

/// バイト列をCSVとして解析する
///
/// # 引数
///
/// * `bytes` - UTF-8でエンコードされたCSVデータ（先頭のBOMは無視）
/// * `delimiter` - 区切り文字（任意の1文字）
///
/// # 戻り値
///
/// * `Ok(Vec<Vec<String>>)` - 行ごとのセル文字列。空入力は0行
/// * `Err(XlsxBulkError::MalformedInput)` - UTF-8として不正、またはCSVとして解析できない場合
///
/// 行ごとの列数は揃っていなくても構いません。空行はセルを持たない行になります。
pub fn parse(bytes: &[u8], delimiter: char) -> Result<Vec<Vec<String>>, XlsxBulkError> {
    let delimiter = Delimiter::classify(delimiter)?;
    let text = std::str::from_utf8(bytes)?;
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let source: Cow<'_, str> = match delimiter {
        Delimiter::Ascii(_) => Cow::Borrowed(text),
        Delimiter::Wide(c) => {
            if text.contains(SURROGATE_CHAR) {
                return Err(XlsxBulkError::MalformedInput(
                    "input contains U+001F, which cannot be combined with a non-ASCII delimiter"
                        .to_string(),
                ));
            }
            Cow::Owned(text.replace(c, "\u{1F}"))
        }
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter.byte())
        .from_reader(source.as_bytes());

    let blanks = BlankLines::scan(&source, delimiter.byte());
    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        rows.extend(std::iter::repeat_with(Vec::new).take(blanks.before(index)));
        let row = match delimiter {
            Delimiter::Ascii(_) => record.iter().map(str::to_string).collect(),
            // 引用符内の区切り文字も置換されているため元に戻す
            Delimiter::Wide(c) => record
                .iter()
                .map(|field| field.replace(SURROGATE_CHAR, &c.to_string()))
                .collect(),
        };
        rows.push(row);
    }
    rows.extend(std::iter::repeat_with(Vec::new).take(blanks.trailing));
    Ok(rows)
}

/// 空行の位置
///
/// `csv`クレートは空行を読み飛ばすため、事前に走査して空行の位置を記録し、
/// 解析結果に空の行として戻します。
#[derive(Debug, Default, PartialEq, Eq)]
struct BlankLines {
    /// `n`番目のレコードの直前にある空行の数
    leading: Vec<usize>,
    /// 最後のレコードより後ろにある空行の数
    trailing: usize,
}

/// 空行走査中のフィールドの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    FieldStart,
    Unquoted,
    Quoted,
    /// 引用符付きフィールド内で`"`を読んだ直後
    QuoteInQuoted,
}

impl BlankLines {
    /// 引用符付きフィールド内の改行はレコード区切りとして扱わない
    fn scan(text: &str, delimiter: u8) -> Self {
        let bytes = text.as_bytes();
        let mut blanks = BlankLines::default();
        let mut state = ScanState::FieldStart;
        let mut line_empty = true;
        let mut pending = 0;

        let mut pos = 0;
        while pos < bytes.len() {
            let byte = bytes[pos];
            pos += 1;

            if matches!(byte, b'\n' | b'\r') && state != ScanState::Quoted {
                if byte == b'\r' && bytes.get(pos) == Some(&b'\n') {
                    pos += 1;
                }
                if line_empty {
                    pending += 1;
                } else {
                    blanks.leading.push(pending);
                    pending = 0;
                }
                state = ScanState::FieldStart;
                line_empty = true;
                continue;
            }

            line_empty = false;
            state = match (state, byte) {
                (ScanState::Quoted, b'"') => ScanState::QuoteInQuoted,
                (ScanState::Quoted, _) => ScanState::Quoted,
                (ScanState::FieldStart | ScanState::QuoteInQuoted, b'"') => ScanState::Quoted,
                (_, b) if b == delimiter => ScanState::FieldStart,
                _ => ScanState::Unquoted,
            };
        }

        if !line_empty {
            blanks.leading.push(pending);
            pending = 0;
        }
        blanks.trailing = pending;
        blanks
    }

    fn before(&self, record: usize) -> usize {
        self.leading.get(record).copied().unwrap_or(0)
    }
}

/// 行データをCSVテキストに変換する
///
/// セルは区切り文字で、行は`\n`で連結されます。区切り文字・引用符・改行を含む
/// セルは引用符で囲まれます。
pub fn serialize<S: AsRef<str>>(rows: &[Vec<S>], delimiter: char) -> Result<String, XlsxBulkError> {
    let delimiter = Delimiter::classify(delimiter)?;

    let mut quote_style = QuoteStyle::Necessary;
    if let Delimiter::Wide(c) = delimiter {
        let cells = || rows.iter().flatten().map(|cell: &S| cell.as_ref());
        if cells().any(|cell: &str| cell.contains(SURROGATE_CHAR)) {
            return Err(XlsxBulkError::MalformedInput(
                "cell contains U+001F, which cannot be combined with a non-ASCII delimiter"
                    .to_string(),
            ));
        }
        // 代替バイトでは区切り文字を含むセルを検出できないため全セルを引用する
        if cells().any(|cell: &str| cell.contains(c)) {
            quote_style = QuoteStyle::Always;
        }
    }

    let mut writer = WriterBuilder::new()
        .delimiter(delimiter.byte())
        .terminator(Terminator::Any(b'\n'))
        .quote_style(quote_style)
        .flexible(true)
        .from_writer(Vec::new());

    for row in rows {
        writer.write_record(row.iter().map(|cell: &S| cell.as_ref().as_bytes()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| XlsxBulkError::Io(e.into_error()))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| XlsxBulkError::MalformedInput(format!("serialized CSV is not UTF-8: {}", e)))?;

    Ok(match delimiter {
        Delimiter::Ascii(_) => text,
        Delimiter::Wide(c) => text.replace(SURROGATE_CHAR, &c.to_string()),
    })
}

/// 行データの最大列数
pub(crate) fn grid_width<S>(rows: &[Vec<S>]) -> usize {
    rows.iter().map(Vec::len).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn strings(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_parse_semicolon_delimiter() {
        let rows = parse(b"a;b;c\n1;2;3", ';').unwrap();
        assert_eq!(rows, strings(&[&["a", "b", "c"], &["1", "2", "3"]]));
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse(b"", ',').unwrap().is_empty());
        assert!(parse("\u{FEFF}".as_bytes(), ',').unwrap().is_empty());
    }

    #[test]
    fn test_parse_universal_newlines() {
        let rows = parse(b"a,b\r\nc,d\re,f\ng,h", ',').unwrap();
        assert_eq!(
            rows,
            strings(&[&["a", "b"], &["c", "d"], &["e", "f"], &["g", "h"]])
        );
    }

    #[test]
    fn test_parse_quoted_fields() {
        let rows = parse(b"name,note\n\"Smith, J\",\"said \"\"hi\"\"\nthen left\"", ',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], "Smith, J");
        assert_eq!(rows[1][1], "said \"hi\"\nthen left");
    }

    #[test]
    fn test_parse_ragged_rows() {
        let rows = parse(b"a,b,c\n1\n2,3", ',').unwrap();
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[1].len(), 1);
        assert_eq!(rows[2].len(), 2);
        assert_eq!(grid_width(&rows), 3);
    }

    #[test]
    fn test_parse_keeps_blank_lines() {
        let empty: &[&str] = &[];
        assert_eq!(parse(b"x\n\ny", ',').unwrap(), strings(&[&["x"], empty, &["y"]]));
        assert_eq!(
            parse(b"\r\na,b\r\n\r\n\r\nc,d\r\n", ',').unwrap(),
            strings(&[empty, &["a", "b"], empty, empty, &["c", "d"]])
        );
        assert_eq!(parse(b"x\n\n", ',').unwrap(), strings(&[&["x"], empty]));
        // 末尾の改行1つは空行にならない
        assert_eq!(parse(b"x\n", ',').unwrap(), strings(&[&["x"]]));
    }

    #[test]
    fn test_parse_newlines_inside_quotes_are_not_blank_lines() {
        let rows = parse(b"\"a\n\nb\",c\n\nd", ',').unwrap();
        assert_eq!(rows, strings(&[&["a\n\nb", "c"], &[], &["d"]]));

        let rows = parse("k§\"v\r\n\r\nw\"\n\nz".as_bytes(), '§').unwrap();
        assert_eq!(rows, strings(&[&["k", "v\r\n\r\nw"], &[], &["z"]]));
    }

    #[test]
    fn test_blank_line_scan_tracks_quotes() {
        let blanks = BlankLines::scan("a\"b\n\n\"c\"\"\n\"\n\nd", b',');
        // 2行目の"c""\n"は引用符付きフィールド
        assert_eq!(blanks.leading, vec![0, 1, 1]);
        assert_eq!(blanks.trailing, 0);
    }

    #[test]
    fn test_parse_strips_bom() {
        let rows = parse("\u{FEFF}x,y\n1,2".as_bytes(), ',').unwrap();
        assert_eq!(rows[0][0], "x");
    }

    #[test]
    fn test_parse_invalid_utf8() {
        let err = parse(&[b'a', b',', 0xff, 0xfe], ',').unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_parse_tab_and_pipe_delimiters() {
        assert_eq!(parse(b"a\tb", '\t').unwrap(), strings(&[&["a", "b"]]));
        assert_eq!(parse(b"a|b|", '|').unwrap(), strings(&[&["a", "b", ""]]));
    }

    #[test]
    fn test_parse_non_ascii_delimiter() {
        let rows = parse("名前§年齢\n太郎§20\n\"a§b\"§c".as_bytes(), '§').unwrap();
        assert_eq!(
            rows,
            strings(&[&["名前", "年齢"], &["太郎", "20"], &["a§b", "c"]])
        );
    }

    #[test]
    fn test_parse_rejects_quote_delimiter() {
        let err = parse(b"a\"b", '"').unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_serialize_basic() {
        let rows = strings(&[&["a", "b"], &["1", "2"]]);
        assert_eq!(serialize(&rows, ',').unwrap(), "a,b\n1,2\n");
        assert_eq!(serialize(&rows, ';').unwrap(), "a;b\n1;2\n");
    }

    #[test]
    fn test_serialize_quotes_when_needed() {
        let rows = strings(&[&["a,b", "plain", "line\nbreak", "q\"q"]]);
        assert_eq!(
            serialize(&rows, ',').unwrap(),
            "\"a,b\",plain,\"line\nbreak\",\"q\"\"q\"\n"
        );
    }

    #[test]
    fn test_serialize_empty_grid() {
        let rows: Vec<Vec<String>> = Vec::new();
        assert_eq!(serialize(&rows, ',').unwrap(), "");
    }

    #[test]
    fn test_serialize_non_ascii_delimiter() {
        let rows = strings(&[&["a", "b"], &["c", "d"]]);
        assert_eq!(serialize(&rows, '→').unwrap(), "a→b\nc→d\n");

        let tricky = strings(&[&["x→y", "z"]]);
        let text = serialize(&tricky, '→').unwrap();
        assert_eq!(parse(text.as_bytes(), '→').unwrap(), tricky);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_serialized_rows_parse_back(
                rows in prop::collection::vec(
                    prop::collection::vec("[a-zA-Z0-9 ,;\"\n]{1,8}", 2..5),
                    1..6
                ),
                delimiter in prop::sample::select(vec![',', ';', '\t', '|', '¦'])
            ) {
                let text = serialize(&rows, delimiter).unwrap();
                let parsed = parse(text.as_bytes(), delimiter).unwrap();
                prop_assert_eq!(parsed, rows);
            }
        }
    }
}
