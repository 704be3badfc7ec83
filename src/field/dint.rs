use super::*;

/// PLC double-int (32-bit signed) field
#[derive(Debug)]
pub struct DInt {
    data_block: i32,
    /// offset example 8.1
    /// left side is index within the block
    /// right side is the bit position only used for bool, zero for all other types
    offset: f32,
    value: i32,
}

impl DInt {
    pub fn new(data_block: i32, offset: f32, mut bytes: Vec<u8>) -> Result<DInt, Error> {
        let len = bytes.len();
        if bytes.len() != DInt::size() as usize {
            return Err(Error::TryFrom(
                bytes,
                format!("DInt.new: expected buf size {} got {}", DInt::size(), len),
            ));
        }

        let bit_offset = ((offset * 10.0) as usize % 10) as u8;
        if bit_offset != 0 {
            return Err(Error::TryFrom(
                bytes,
                format!(
                    "DInt.new: double-int should not have a bit offset got {}",
                    bit_offset
                ),
            ));
        }

        Ok(DInt {
            data_block,
            offset,
            value: BigEndian::read_i32(bytes.as_mut_slice()),
        })
    }

    pub fn size() -> i32 {
        4
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn set_value(&mut self, v: i32) {
        self.value = v
    }
}

impl Field for DInt {
    fn data_block(&self) -> i32 {
        self.data_block
    }

    fn offset(&self) -> i32 {
        self.offset as i32
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; DInt::size() as usize];
        BigEndian::write_i32(buf.as_mut_slice(), self.value);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dint() {
        let val: i32 = -12345;
        let mut b = vec![0u8; DInt::size() as usize];
        BigEndian::write_i32(b.as_mut_slice(), val);
        let mut field = DInt::new(888, 8.0, b).unwrap();
        field.set_value(val);
        assert_eq!(field.value(), val);

        DInt::new(888, 8.1, vec![0, 0, 0, 1])
            .expect_err("should return an error at invalid bit offset 1");
    }
}
