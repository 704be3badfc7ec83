// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Shared byte-level patching helpers used by the area, multi-var and
//! SZL code: big-endian field access, the 3-byte area-address field,
//! single-bit access and the S7 date-time (BCD) codec.

use super::error::Error;
use byteorder::{BigEndian, ByteOrder};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Writes `v` as a big-endian `u16` at `buf[offset..offset+2]`.
pub(crate) fn write_u16_be(buf: &mut [u8], offset: usize, v: u16) {
    BigEndian::write_u16(&mut buf[offset..offset + 2], v);
}

/// Reads a big-endian `u16` from `buf[offset..offset+2]`.
pub(crate) fn read_u16_be(buf: &[u8], offset: usize) -> u16 {
    BigEndian::read_u16(&buf[offset..offset + 2])
}

/// Writes `v` as a big-endian `u32` at `buf[offset..offset+4]`.
pub(crate) fn write_u32_be(buf: &mut [u8], offset: usize, v: u32) {
    BigEndian::write_u32(&mut buf[offset..offset + 4], v);
}

/// Reads a big-endian `u32` from `buf[offset..offset+4]`.
pub(crate) fn read_u32_be(buf: &[u8], offset: usize) -> u32 {
    BigEndian::read_u32(&buf[offset..offset + 4])
}

/// Patches the 3-byte big-endian area-offset field the read/write/
/// multi-var telegrams all carry at a fixed position (e.g. PDU bytes
/// 28..30), MSB first.
pub(crate) fn write_address_3(buf: &mut [u8], offset: usize, address: u32) {
    buf[offset] = ((address >> 16) & 0xFF) as u8;
    buf[offset + 1] = ((address >> 8) & 0xFF) as u8;
    buf[offset + 2] = (address & 0xFF) as u8;
}

/// Reads the 3-byte big-endian area-offset field back into a `u32`.
pub(crate) fn read_address_3(buf: &[u8], offset: usize) -> u32 {
    ((buf[offset] as u32) << 16) | ((buf[offset + 1] as u32) << 8) | (buf[offset + 2] as u32)
}

/// Gets the bit at `bit_pos` (0..=7) within `buf[byte_pos]`.
pub(crate) fn get_bit(buf: &[u8], byte_pos: usize, bit_pos: u8) -> bool {
    buf[byte_pos] & (1 << bit_pos) != 0
}

/// Sets or clears the bit at `bit_pos` (0..=7) within `buf[byte_pos]`.
pub(crate) fn set_bit(buf: &mut [u8], byte_pos: usize, bit_pos: u8, value: bool) {
    if value {
        buf[byte_pos] |= 1 << bit_pos;
    } else {
        buf[byte_pos] &= !(1 << bit_pos);
    }
}

fn to_bcd(v: u32) -> u8 {
    (((v / 10) % 10) * 16 + (v % 10)) as u8
}

fn from_bcd(b: u8) -> u32 {
    ((b >> 4) * 10 + (b & 0x0F)) as u32
}

/// Encodes an S7 date-time into the 8-byte wire form: BCD two-digit
/// year (century inferred by the decode-side rule below), BCD month,
/// day, hour, minute, second, then a millisecond high byte (`ms / 10`)
/// and a final byte packing `(ms_low_digit << 4) | day_of_week`, where
/// day_of_week is 1..7 (Sunday = 1, per the S7 convention).
pub(crate) fn encode_s7_datetime(dt: &NaiveDateTime) -> [u8; 8] {
    let year = dt.year();
    let century_stripped = (year.rem_euclid(100)) as u32;
    let ms = dt.nanosecond() / 1_000_000;
    // chrono's Weekday::Sun is 6 in num_days_from_monday terms; S7 wants Sunday = 1.
    let dow = (dt.weekday().num_days_from_sunday() + 1) as u8;

    [
        to_bcd(century_stripped),
        to_bcd(dt.month()),
        to_bcd(dt.day()),
        to_bcd(dt.hour()),
        to_bcd(dt.minute()),
        to_bcd(dt.second()),
        (ms / 10) as u8,
        (((ms % 10) as u8) << 4) | (dow & 0x0F),
    ]
}

/// Decodes the 8-byte S7 date-time wire form, applying the century
/// rule: a BCD year `<= 89` is 2000-based, otherwise 1900-based. The
/// millisecond value is reassembled from both the high byte and the
/// low nibble of the trailing day-of-week byte.
pub(crate) fn decode_s7_datetime(buf: &[u8]) -> Result<NaiveDateTime, Error> {
    if buf.len() < 8 {
        return Err(Error::TryFrom(
            buf.to_vec(),
            format!("decode_s7_datetime: expected 8 bytes got {}", buf.len()),
        ));
    }
    let yy = from_bcd(buf[0]);
    let year = if yy <= 89 { 2000 + yy as i32 } else { 1900 + yy as i32 };
    let month = from_bcd(buf[1]);
    let day = from_bcd(buf[2]);
    let hour = from_bcd(buf[3]);
    let minute = from_bcd(buf[4]);
    let second = from_bcd(buf[5]);
    let ms_total = (buf[6] as u32) * 10 + ((buf[7] >> 4) as u32);
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        Error::TryFrom(
            buf.to_vec(),
            format!("decode_s7_datetime: invalid date {}-{}-{}", year, month, day),
        )
    })?;
    let time = date
        .and_hms_milli_opt(hour, minute, second, ms_total)
        .ok_or_else(|| {
            Error::TryFrom(
                buf.to_vec(),
                format!(
                    "decode_s7_datetime: invalid time {}:{}:{}.{}",
                    hour, minute, second, ms_total
                ),
            )
        })?;
    Ok(time)
}

/// Decodes a block-info code/interface date: a `u16` count of days since
/// 1990-01-01, the format Step7 stores block timestamps in (distinct
/// from the 8-byte BCD clock wire form above).
pub(crate) fn decode_block_date(days: u16) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1990, 1, 1)?
        .checked_add_signed(chrono::Duration::days(days as i64))?
        .and_hms_opt(0, 0, 0)
}

/// Trims a fixed-width ASCII field (space- or NUL-padded, as block-info
/// author/family/header fields are) down to its meaningful content.
pub(crate) fn ascii_field(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches(['\0', ' '])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_3_roundtrip() {
        let mut buf = [0u8; 3];
        write_address_3(&mut buf, 0, 0x123456);
        assert_eq!(buf, [0x12, 0x34, 0x56]);
        assert_eq!(read_address_3(&buf, 0), 0x123456);
    }

    #[test]
    fn test_bit_roundtrip() {
        let mut buf = [0u8; 1];
        set_bit(&mut buf, 0, 3, true);
        assert_eq!(buf[0], 0b0000_1000);
        assert!(get_bit(&buf, 0, 3));
        set_bit(&mut buf, 0, 3, false);
        assert!(!get_bit(&buf, 0, 3));
    }

    #[test]
    fn test_u16_roundtrip() {
        let mut buf = [0u8; 4];
        write_u16_be(&mut buf, 1, 0xABCD);
        assert_eq!(&buf[1..3], &[0xAB, 0xCD]);
        assert_eq!(read_u16_be(&buf, 1), 0xABCD);
    }

    #[test]
    fn test_datetime_century_rule() {
        let dt = NaiveDate::from_ymd_opt(2017, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let enc = encode_s7_datetime(&dt);
        assert_eq!(enc[0], 0x17);

        let dt = NaiveDate::from_ymd_opt(1989, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let enc = encode_s7_datetime(&dt);
        assert_eq!(enc[0], 0x89);

        let dec = decode_s7_datetime(&[0x17, 0x06, 0x01, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(dec.year(), 2017);

        let dec = decode_s7_datetime(&[0x89, 0x06, 0x01, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(dec.year(), 1989);
    }

    #[test]
    fn test_decode_block_date() {
        let dt = decode_block_date(0).unwrap();
        assert_eq!(dt.year(), 1990);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 1);
    }

    #[test]
    fn test_ascii_field() {
        assert_eq!(ascii_field(b"Siemens \0\0"), "Siemens");
        assert_eq!(ascii_field(b"AWL     "), "AWL");
    }
}
