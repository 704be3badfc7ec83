// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

use super::codec;
use super::constant::{self, Area, BlockLang, CpuStatus, SubBlockType};
use super::error::{self, Error};
use super::transport::{self, Transport};
use byteorder::{BigEndian, ByteOrder};
use chrono::NaiveDateTime;
use std::str;

/// A single item in a `read_multi_vars`/`write_multi_vars` batch.
#[derive(Debug)]
pub struct S7DataItem {
    pub area: u8,
    pub word_len: u8,
    pub db_num: u16,
    pub start: u16,
    pub size: u16,
    pub buffer: Vec<u8>,
    pub result: Result<(), Error>,
}

/// Identifies which CPU block table `get_ag_block_info` inspects.
#[derive(Debug, Copy, Clone)]
pub enum BlockType {
    Ob = 0x38,
    Db = 0x41,
    Sdb = 0x42,
    Fc = 0x43,
    Sfc = 0x44,
    Fb = 0x45,
    Sfb = 0x46,
}

#[derive(Debug, Clone)]
pub struct CpuInfo {
    pub module_type_name: String,
    pub serial_number: String,
    pub as_name: String,
    pub copyright: String,
    pub module_name: String,
}

#[derive(Debug, Clone)]
pub struct CpInfo {
    pub max_pdu_length: u16,
    pub max_connections: u16,
    pub max_mpi_rate: u16,
    pub max_bus_rate: u16,
}

#[derive(Debug, Clone)]
pub struct BlockList {
    pub ob_block_count: u16,
    pub fb_block_count: u16,
    pub fc_block_count: u16,
    pub db_block_count: u16,
    pub sdb_block_count: u16,
    pub sfc_block_count: u16,
    pub sfb_block_count: u16,
}

#[derive(Debug)]
pub struct S7BlockInfo {
    pub block_type: SubBlockType,
    pub block_number: u16,
    pub block_lang: BlockLang,
    pub block_flags: u8,
    pub mc7_size: u16,
    pub load_size: i32,
    pub local_data: u16,
    pub sbb_length: u16,
    pub version: u8,
    pub code_date: NaiveDateTime,
    pub interface_date: NaiveDateTime,
    pub author: String,
    pub family: String,
    pub header: String,
}

/// Allows for communication with S7 family devices.
///
/// A `Client` owns a single `Transport` and, like the transport itself,
/// is not safe to share across threads: the library does not multiplex
/// requests, the wire protocol is strictly request/response, and
/// concurrent calls on one session will corrupt the PDU buffer.
pub struct Client<T: Transport> {
    transport: T,
}

impl<T: Transport> Client<T> {
    pub fn new(mut transport: T) -> Result<Client<T>, Error> {
        transport.negotiate()?;
        Ok(Client { transport })
    }

    /// # Examples
    ///
    /// ```no_run
    /// use std::net::{Ipv4Addr, IpAddr};
    /// use s7::{client, tcp, transport};
    /// use std::time::Duration;
    ///
    /// let addr = Ipv4Addr::new(127, 0, 0, 1);
    /// let mut opts = tcp::Options::new(IpAddr::from(addr), 0, 2, transport::Connection::PG);
    ///
    /// opts.read_timeout = Duration::from_secs(2);
    /// opts.write_timeout = Duration::from_secs(2);
    ///
    /// let t = tcp::Transport::connect(opts).unwrap();
    /// let mut cl = client::Client::new(t).unwrap();
    ///
    /// let buffer = &mut vec![0u8; 1];
    ///
    /// match cl.db_read(888, 8, 1, buffer) {
    ///       Ok(()) => println!("buffer: {:?}", buffer),
    ///       Err(e) => println!("error: {:?}", e)
    /// }
    /// ```
    pub fn db_read(
        &mut self,
        db_number: i32,
        start: i32,
        size: i32,
        buffer: &mut Vec<u8>,
    ) -> Result<(), Error> {
        self.read(
            Area::DataBausteine,
            db_number,
            start,
            size,
            constant::WL_BYTE,
            buffer,
        )
    }

    pub fn db_write(
        &mut self,
        db_number: i32,
        start: i32,
        size: i32,
        buffer: &mut Vec<u8>,
    ) -> Result<(), Error> {
        self.write(
            Area::DataBausteine,
            db_number,
            start,
            size,
            constant::WL_BYTE,
            buffer,
        )
    }

    pub fn mb_read(&mut self, start: i32, size: i32, buffer: &mut Vec<u8>) -> Result<(), Error> {
        self.read(Area::Merker, 0, start, size, constant::WL_BYTE, buffer)
    }

    pub fn mb_write(&mut self, start: i32, size: i32, buffer: &mut Vec<u8>) -> Result<(), Error> {
        self.write(Area::Merker, 0, start, size, constant::WL_BYTE, buffer)
    }

    pub fn eb_read(&mut self, start: i32, size: i32, buffer: &mut Vec<u8>) -> Result<(), Error> {
        self.read(
            Area::ProcessInput,
            0,
            start,
            size,
            constant::WL_BYTE,
            buffer,
        )
    }

    pub fn eb_write(&mut self, start: i32, size: i32, buffer: &mut Vec<u8>) -> Result<(), Error> {
        self.write(
            Area::ProcessInput,
            0,
            start,
            size,
            constant::WL_BYTE,
            buffer,
        )
    }

    pub fn ab_read(&mut self, start: i32, size: i32, buffer: &mut Vec<u8>) -> Result<(), Error> {
        self.read(
            Area::ProcessOutput,
            0,
            start,
            size,
            constant::WL_BYTE,
            buffer,
        )
    }

    pub fn ab_write(&mut self, start: i32, size: i32, buffer: &mut Vec<u8>) -> Result<(), Error> {
        self.write(
            Area::ProcessOutput,
            0,
            start,
            size,
            constant::WL_BYTE,
            buffer,
        )
    }

    /// Reads a counter bank.
    pub fn ct_read(&mut self, start: i32, size: i32, buffer: &mut Vec<u8>) -> Result<(), Error> {
        self.read(Area::Counter, 0, start, size, constant::WL_COUNTER, buffer)
    }

    /// Writes a counter bank.
    pub fn ct_write(&mut self, start: i32, size: i32, buffer: &mut Vec<u8>) -> Result<(), Error> {
        self.write(Area::Counter, 0, start, size, constant::WL_COUNTER, buffer)
    }

    /// Reads a timer bank.
    pub fn tm_read(&mut self, start: i32, size: i32, buffer: &mut Vec<u8>) -> Result<(), Error> {
        self.read(Area::Timer, 0, start, size, constant::WL_TIMER, buffer)
    }

    /// Writes a timer bank.
    pub fn tm_write(&mut self, start: i32, size: i32, buffer: &mut Vec<u8>) -> Result<(), Error> {
        self.write(Area::Timer, 0, start, size, constant::WL_TIMER, buffer)
    }

    /// Reads up to `MAX_VARS_MULTI_READ_WRITE` items from possibly
    /// different areas in a single request.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::net::{Ipv4Addr, IpAddr};
    /// use s7::{client, tcp, transport, constant};
    /// use s7::constant::Area;
    /// use s7::client::S7DataItem;
    /// use std::time::Duration;
    ///
    /// let addr = Ipv4Addr::new(127, 0, 0, 1);
    /// let mut opts = tcp::Options::new(IpAddr::from(addr), 0, 2, transport::Connection::PG);
    /// opts.read_timeout = Duration::from_secs(2);
    /// opts.write_timeout = Duration::from_secs(2);
    /// let t = tcp::Transport::connect(opts).unwrap();
    /// let mut cl = client::Client::new(t).unwrap();
    ///
    /// let mut items = vec![S7DataItem {
    ///     area: Area::DataBausteine as u8,
    ///     word_len: constant::WL_BYTE as u8,
    ///     db_num: 888,
    ///     start: 0,
    ///     size: 1,
    ///     buffer: vec![0u8; 1],
    ///     result: Ok(()),
    /// }];
    /// cl.read_multi_vars(&mut items).unwrap();
    /// ```
    pub fn read_multi_vars(&mut self, items: &mut Vec<S7DataItem>) -> Result<(), Error> {
        let item_len = items.len();

        if item_len > transport::MAX_VARS_MULTI_READ_WRITE {
            return Err(Error::Response {
                code: error::CLI_TOO_MANY_ITEMS,
            });
        }

        let mut request = transport::MRD_HEADER.to_vec();
        let header_bytes = ((item_len * transport::MRD_ITEM.len() + 2) as u16).to_be_bytes();
        request[13] = header_bytes[0];
        request[14] = header_bytes[1];
        request[18] = item_len as u8;

        for item in items.iter() {
            let mut s7_item = transport::MRD_ITEM.to_vec();
            s7_item[3] = item.word_len;

            let size_bytes = item.size.to_be_bytes();
            s7_item[4] = size_bytes[0];
            s7_item[5] = size_bytes[1];

            let db_bytes = item.db_num.to_be_bytes();
            s7_item[6] = db_bytes[0];
            s7_item[7] = db_bytes[1];

            s7_item[8] = item.area;

            let address = match item.word_len as i32 {
                constant::WL_BIT | constant::WL_COUNTER | constant::WL_TIMER => item.start as u32,
                _ => (item.start as u32) << 3,
            };
            codec::write_address_3(&mut s7_item, 9, address);

            request.append(&mut s7_item);
        }

        let request_size = (request.len() as u16).to_be_bytes();
        request[2] = request_size[0];
        request[3] = request_size[1];

        let response = self.transport.send(request.as_slice())?;

        if response.len() < 22 {
            return Err(Error::InvalidResponse {
                reason: "PDU too small".to_string(),
                bytes: response,
            });
        }

        let error_code = codec::read_u16_be(&response, 17);
        if error_code != 0 {
            return Err(Error::CPU {
                code: error_code as i32,
            });
        }

        let items_read = response[20];
        if items_read as usize != item_len || items_read as usize > transport::MAX_VARS_MULTI_READ_WRITE {
            return Err(Error::InvalidResponse {
                reason: "received item count does not match request".to_string(),
                bytes: response,
            });
        }

        let mut offset = 21;

        for item in items.iter_mut() {
            if response.len() < offset + 4 {
                item.result = Err(Error::InvalidResponse {
                    reason: "truncated multi-read item".to_string(),
                    bytes: response.clone(),
                });
                break;
            }

            if response[offset] == 0xFF {
                let mut item_size = codec::read_u16_be(&response, offset + 2);
                let transport_size = response[offset + 1];

                if transport_size != constant::TS_RES_OCTET
                    && transport_size != constant::TS_RES_REAL
                    && transport_size != constant::TS_RES_BIT
                {
                    item_size >>= 3;
                }

                let data_start = offset + 4;
                item.buffer = response[data_start..data_start + item_size as usize].to_vec();
                item.result = Ok(());

                if item_size % 2 != 0 {
                    item_size += 1;
                }
                offset = data_start + item_size as usize;
            } else {
                item.result = Err(Error::CPU {
                    code: response[offset] as i32,
                });
                offset += 4;
            }
        }
        Ok(())
    }

    /// Writes up to `MAX_VARS_MULTI_READ_WRITE` items in a single
    /// request, possibly spanning different areas. Each item's
    /// `result` is set from the per-item acknowledgement byte the PLC
    /// returns.
    pub fn write_multi_vars(&mut self, items: &mut Vec<S7DataItem>) -> Result<(), Error> {
        let item_count = items.len();

        if item_count > transport::MAX_VARS_MULTI_READ_WRITE {
            return Err(Error::Response {
                code: error::CLI_TOO_MANY_ITEMS,
            });
        }

        let mut request = transport::MWR_HEADER.to_vec();
        let par_length = (item_count * transport::MWR_PARAM.len() + 2) as u16;
        codec::write_u16_be(&mut request, 13, par_length);
        request[18] = item_count as u8;

        for item in items.iter() {
            let mut s7_par = transport::MWR_PARAM.to_vec();
            s7_par[3] = item.word_len;
            s7_par[8] = item.area;

            let size_bytes = item.size.to_be_bytes();
            s7_par[4] = size_bytes[0];
            s7_par[5] = size_bytes[1];

            let db_bytes = item.db_num.to_be_bytes();
            s7_par[6] = db_bytes[0];
            s7_par[7] = db_bytes[1];

            let address = match item.word_len as i32 {
                constant::WL_BIT | constant::WL_COUNTER | constant::WL_TIMER => item.start as u32,
                _ => (item.start as u32) << 3,
            };
            codec::write_address_3(&mut s7_par, 9, address);

            request.append(&mut s7_par);
        }

        let mut data_length: u32 = 0;

        for item in items.iter() {
            let transport_size = match item.word_len as i32 {
                constant::WL_BIT => constant::TS_RES_BIT,
                constant::WL_COUNTER | constant::WL_TIMER => constant::TS_RES_OCTET,
                _ => constant::TS_RES_BYTE,
            };

            let item_data_size: u32 = if item.word_len as i32 == constant::WL_TIMER
                || item.word_len as i32 == constant::WL_COUNTER
            {
                item.size as u32 * 2
            } else {
                item.size as u32
            };

            let bit_length = if transport_size != constant::TS_RES_OCTET
                && transport_size != constant::TS_RES_BIT
            {
                item_data_size * 8
            } else {
                item_data_size
            };

            let mut s7_data = vec![0u8; 4];
            s7_data[0] = 0;
            s7_data[1] = transport_size;
            codec::write_u16_be(&mut s7_data, 2, bit_length as u16);
            s7_data.extend_from_slice(&item.buffer[..item_data_size as usize]);

            let mut padded_size = item_data_size;
            if padded_size % 2 != 0 {
                s7_data.push(0);
                padded_size += 1;
            }

            request.append(&mut s7_data);
            data_length += padded_size + 4;
        }

        let pdu_length = self.transport.pdu_length();
        if request.len() > pdu_length as usize {
            return Err(Error::PduLength(pdu_length));
        }

        codec::write_u16_be(&mut request, 2, request.len() as u16);
        codec::write_u16_be(&mut request, 15, data_length as u16);

        let response = self.transport.send(request.as_slice())?;

        if response.len() < 21 {
            return Err(Error::InvalidResponse {
                reason: "PDU too small".to_string(),
                bytes: response,
            });
        }

        let global_result = codec::read_u16_be(&response, 17);
        if global_result != 0 {
            return Err(Error::CPU {
                code: global_result as i32,
            });
        }

        let items_written = response[20] as usize;
        if items_written != item_count {
            return Err(Error::InvalidResponse {
                reason: "acknowledged item count does not match request".to_string(),
                bytes: response,
            });
        }

        for (i, item) in items.iter_mut().enumerate() {
            let ack = response[21 + i];
            item.result = if ack == 0xFF {
                Ok(())
            } else {
                Err(Error::CPU { code: ack as i32 })
            };
        }
        Ok(())
    }

    //read generic area, pass result into a buffer
    fn read(
        &mut self,
        area: Area,
        db_number: i32,
        mut start: i32,
        mut amount: i32,
        mut word_len: i32,
        buffer: &mut Vec<u8>,
    ) -> Result<(), Error> {
        // Some adjustment
        match area {
            Area::Counter => word_len = constant::WL_COUNTER,
            Area::Timer => word_len = constant::WL_TIMER,
            _ => {}
        };

        // Calc Word size
        let mut word_size = constant::data_size_byte(word_len);

        if word_size == 0 {
            return Err(Error::Response {
                code: error::ISO_INVALID_DATA_SIZE,
            });
        }

        if word_len == constant::WL_BIT {
            amount = 1; // Only 1 bit can be transferred at time
        } else if word_len != constant::WL_COUNTER && word_len != constant::WL_TIMER {
            amount *= word_size;
            word_size = 1;
            word_len = constant::WL_BYTE;
        }

        let pdu_length = self.transport.pdu_length();

        if pdu_length == 0 {
            return Err(Error::PduLength(pdu_length));
        }

        let max_elements = (pdu_length - 18) / word_size; // 18 = Reply telegram header

        let mut tot_elements = amount;
        let db_bytes = (db_number as u16).to_be_bytes();
        let mut offset = 0;

        while tot_elements > 0 {
            let mut num_elements = tot_elements;

            if num_elements > max_elements {
                num_elements = max_elements;
            }

            let size_requested = num_elements * word_size;
            // Setup the telegram
            let mut request =
                transport::READ_WRITE_TELEGRAM[..constant::SIZE_HEADER_READ as usize].to_vec();

            // Set DB Number
            request[25] = db_bytes[0];
            request[26] = db_bytes[1];

            // Set Area
            request[27] = area as u8;

            // Adjusts Start and word length
            let address = match word_len {
                constant::WL_BIT | constant::WL_COUNTER | constant::WL_TIMER => {
                    request[22] = word_len as u8;
                    start as u32
                }
                _ => (start as u32) << 3,
            };

            // Num elements
            codec::write_u16_be(&mut request, 23, num_elements as u16);

            // Address into the PLC (only 3 bytes)
            codec::write_address_3(&mut request, 28, address);

            let response = self.transport.send(request.as_slice())?;

            if response.len() < 25 {
                return Err(Error::Response {
                    code: error::ISO_INVALID_DATA_SIZE,
                });
            }

            if response[21] != 0xFF {
                return Err(Error::CPU {
                    code: response[21] as i32,
                });
            }
            let (mut i, end): (usize, usize) = (25, 25 + (size_requested as usize));

            //copy response to buffer
            for k in offset..(offset + size_requested) {
                if i == end {
                    break;
                }
                buffer[k as usize] = response[i];
                i += 1;
            }
            offset += size_requested;

            tot_elements -= num_elements;
            start += num_elements * word_size
        }
        Ok(())
    }

    fn write(
        &mut self,
        area: Area,
        db_number: i32,
        mut start: i32,
        mut amount: i32,
        mut word_len: i32,
        buffer: &mut Vec<u8>,
    ) -> Result<(), Error> {
        // Some adjustment
        word_len = match area {
            Area::Counter => constant::WL_COUNTER,
            Area::Timer => constant::WL_TIMER,
            _ => word_len,
        };

        // Calc Word size
        let mut word_size = constant::data_size_byte(word_len);

        if word_size == 0 {
            return Err(Error::Response {
                code: error::ISO_INVALID_DATA_SIZE,
            });
        }

        if word_len == constant::WL_BIT {
            amount = 1; // Only 1 bit can be transferred at time
        } else if word_len != constant::WL_COUNTER && word_len != constant::WL_TIMER {
            amount *= word_size;
            word_size = 1;
            word_len = constant::WL_BYTE;
        }

        let mut offset: i32 = 0;
        let pdu_length = self.transport.pdu_length();
        let max_elements = (pdu_length - 35) / word_size; // 35 = Reply telegram header
        let mut tot_elements = amount;

        while tot_elements > 0 {
            let mut num_elements = tot_elements;
            if num_elements > max_elements {
                num_elements = max_elements;
            }
            let data_size = num_elements * word_size;
            let iso_size = constant::SIZE_HEADER_WRITE + data_size;

            // Setup the telegram
            let mut request_data = transport::READ_WRITE_TELEGRAM.to_vec();
            // Whole telegram Size
            codec::write_u16_be(&mut request_data, 2, iso_size as u16);
            // Function
            request_data[17] = 0x05;
            // Set DB Number / Area
            request_data[27] = area as u8;

            if let Area::DataBausteine = area {
                codec::write_u16_be(&mut request_data, 25, db_number as u16);
            }
            // Adjusts start and word length
            let length;
            let address = match word_len {
                constant::WL_BIT | constant::WL_COUNTER | constant::WL_TIMER => {
                    length = data_size;
                    request_data[22] = word_len as u8;
                    start as u32
                }
                _ => {
                    length = data_size << 3;
                    (start as u32) << 3
                }
            };

            // Data length
            codec::write_u16_be(&mut request_data, 15, (data_size + 4) as u16);
            // Num elements
            codec::write_u16_be(&mut request_data, 23, num_elements as u16);
            // address into the PLC
            codec::write_address_3(&mut request_data, 28, address);

            // Transport Size
            match word_len {
                constant::WL_BIT => request_data[32] = constant::TS_RES_BIT,
                constant::WL_COUNTER | constant::WL_TIMER => {
                    request_data[32] = constant::TS_RES_OCTET
                }
                _ => request_data[32] = constant::TS_RES_BYTE, // byte/word/dword etc.
            }
            // length
            codec::write_u16_be(&mut request_data, 33, length as u16);

            //expand values into array
            request_data.splice(
                35..35,
                buffer[offset as usize..offset as usize + data_size as usize].to_vec(),
            );

            let response = self.transport.send(request_data.as_mut_slice())?;

            if response.len() != 22 {
                return Err(Error::Response {
                    code: error::ISO_INVALID_PDU,
                });
            }

            if response[21] != 0xFF {
                return Err(Error::CPU {
                    code: response[21] as i32,
                });
            }

            offset += data_size;
            tot_elements -= num_elements;
            start += num_elements * word_size;
        }
        Ok(())
    }

    /// Starting the CPU from power off, current configuration is discarded and program processing begins again with the initial values.
    pub fn start(&mut self) -> Result<(), Error> {
        self.cold_warm_start_stop(
            transport::COLD_START_TELEGRAM.as_ref(),
            transport::PDU_START,
            error::CLI_CANNOT_START_PLC,
            transport::PDU_ALREADY_STARTED,
            error::CLI_ALREADY_RUN,
        )
    }

    /// Restarting the CPU without turning the power off, program processing starts once again where retentive data is retained.
    pub fn restart(&mut self) -> Result<(), Error> {
        self.cold_warm_start_stop(
            transport::WARM_START_TELEGRAM.as_ref(),
            transport::PDU_START,
            error::CLI_CANNOT_START_PLC,
            transport::PDU_ALREADY_STARTED,
            error::CLI_ALREADY_RUN,
        )
    }

    /// Shut down.
    pub fn stop(&mut self) -> Result<(), Error> {
        self.cold_warm_start_stop(
            transport::STOP_TELEGRAM.as_ref(),
            transport::PDU_STOP,
            error::CLI_CANNOT_STOP_PLC,
            transport::PDU_ALREADY_STOPPED,
            error::CLI_ALREADY_STOP,
        )
    }

    fn cold_warm_start_stop(
        &mut self,
        req: &[u8],
        start_cmp: u8,
        start: i32,
        already_cmp: u8,
        already: i32,
    ) -> Result<(), Error> {
        let response = self.transport.send(req)?;

        if response.len() <= transport::TELEGRAM_MIN_RESPONSE {
            return Err(Error::Response {
                code: error::ISO_INVALID_PDU,
            });
        }
        if response[19] != start_cmp {
            return Err(Error::Response { code: start });
        }
        if response[20] == already_cmp {
            return Err(Error::Response { code: already });
        }
        Ok(())
    }

    /// Reads the CPU run/stop state.
    pub fn plc_status(&mut self) -> Result<CpuStatus, Error> {
        let response = self
            .transport
            .send(transport::PLC_STATUS_TELEGRAM.as_ref())?;

        if response.len() < transport::PLC_STATUS_MIN_RESPONSE {
            return Err(Error::Response {
                code: error::ISO_INVALID_PDU,
            });
        }

        let result = codec::read_u16_be(&response, 27);
        if result != 0 {
            return Err(Error::CPU {
                code: result as i32,
            });
        }

        CpuStatus::from_u8(response[44])
    }

    /// Reads the PLC's current date and time.
    pub fn get_plc_datetime(&mut self) -> Result<NaiveDateTime, Error> {
        let response = self.transport.send(transport::CLOCK_READ_TELEGRAM.as_ref())?;

        if response.len() <= 30 {
            return Err(Error::Response {
                code: error::ISO_INVALID_PDU,
            });
        }
        let status = codec::read_u16_be(&response, 27);
        if status != 0 || response[29] != 0xFF {
            return Err(Error::CPU {
                code: status as i32,
            });
        }
        codec::decode_s7_datetime(&response[34..])
    }

    /// Sets the PLC's date and time.
    pub fn set_plc_datetime(&mut self, dt: &NaiveDateTime) -> Result<(), Error> {
        let mut request = transport::CLOCK_WRITE_TELEGRAM.to_vec();
        let encoded = codec::encode_s7_datetime(dt);
        request[34..34 + encoded.len()].copy_from_slice(&encoded);

        let response = self.transport.send(request.as_slice())?;

        if response.len() <= 30 {
            return Err(Error::Response {
                code: error::ISO_INVALID_PDU,
            });
        }
        let status = codec::read_u16_be(&response, 27);
        if status != 0 {
            return Err(Error::CPU {
                code: status as i32,
            });
        }
        Ok(())
    }

    /// Sets the session password, right-padding or truncating `pw` to
    /// 8 bytes and XOR-encoding it as the protocol requires.
    pub fn set_session_password(&mut self, pw: &str) -> Result<(), Error> {
        let mut request = transport::SET_PASSWORD_TELEGRAM.to_vec();
        let encoded = encode_password(pw);
        request[29..29 + encoded.len()].copy_from_slice(&encoded);

        let response = self.transport.send(request.as_slice())?;

        if response.len() <= 32 {
            return Err(Error::Response {
                code: error::ISO_INVALID_PDU,
            });
        }
        let status = codec::read_u16_be(&response, 27);
        if status != 0 {
            return Err(Error::CPU {
                code: status as i32,
            });
        }
        Ok(())
    }

    /// Clears the session password.
    pub fn clear_session_password(&mut self) -> Result<(), Error> {
        let response = self
            .transport
            .send(transport::CLEAR_PASSWORD_TELEGRAM.as_ref())?;

        if response.len() <= 30 {
            return Err(Error::Response {
                code: error::ISO_INVALID_PDU,
            });
        }
        let status = codec::read_u16_be(&response, 27);
        if status != 0 {
            return Err(Error::CPU {
                code: status as i32,
            });
        }
        Ok(())
    }

    /// Fetches a CP (communication processor) capability page from the
    /// system status list.
    pub fn cp_info(&mut self) -> Result<CpInfo, Error> {
        let szl = self.read_szl(0x0131, 0x000)?;

        Ok(CpInfo {
            max_pdu_length: BigEndian::read_u16(szl.data[2..].as_ref()),
            max_connections: BigEndian::read_u16(szl.data[4..].as_ref()),
            max_mpi_rate: BigEndian::read_u16(szl.data[6..].as_ref()),
            max_bus_rate: BigEndian::read_u16(szl.data[10..].as_ref()),
        })
    }

    /// Fetches CPU identification from the system status list.
    pub fn cpu_info(&mut self) -> Result<CpuInfo, Error> {
        let szl = self.read_szl(0x001C, 0x000)?;

        if szl.data.len() < transport::SZL_MIN_RESPONSE {
            return Err(Error::Response {
                code: error::ISO_INVALID_PDU,
            });
        }

        let field = |range: std::ops::Range<usize>| -> Result<String, Error> {
            str::from_utf8(&szl.data[range.clone()])
                .map(|s| s.trim_end_matches(' ').to_string())
                .map_err(|e| Error::InvalidResponse {
                    bytes: szl.data[range].to_vec(),
                    reason: e.to_string(),
                })
        };

        Ok(CpuInfo {
            module_type_name: field(172..204)?,
            serial_number: field(138..162)?,
            as_name: field(2..26)?,
            copyright: field(104..130)?,
            module_name: field(36..60)?,
        })
    }

    /// Fetches a page of the system status list, transparently
    /// following the continuation protocol until the PLC reports it
    /// has no more data.
    fn read_szl(&mut self, id: u16, index: u16) -> Result<transport::S7SZL, Error> {
        let mut seq_out: u16 = 0;

        let mut s7_szlfirst = transport::SZL_FIRST_TELEGRAM.to_vec();
        seq_out += 1;
        codec::write_u16_be(&mut s7_szlfirst, 11, seq_out);
        codec::write_u16_be(&mut s7_szlfirst, 29, id);
        codec::write_u16_be(&mut s7_szlfirst, 31, index);

        let res = self.transport.send(s7_szlfirst.as_ref())?;

        let validate = |res: &[u8], size: usize| -> Result<(), Error> {
            if res.len() < transport::MIN_SZL_FIRST_TELEGRAM + size {
                return Err(Error::Response {
                    code: error::ISO_INVALID_PDU,
                });
            }
            if codec::read_u16_be(res, 27) != 0 || res[29] != 0xFF {
                return Err(Error::CPU {
                    code: error::CLI_INVALID_PLC_ANSWER,
                });
            }
            Ok(())
        };

        validate(res.as_ref(), 0)?;

        // Skips extra params (ID, Index ...)
        let data_szl = codec::read_u16_be(&res, 31) - 8;
        validate(res.as_ref(), data_szl as usize)?;

        let mut done = res[26] == 0x00;
        let mut seq_in: u8 = res[24];
        let header = transport::SZLHeader {
            length_header: codec::read_u16_be(&res, 37) * 2,
            number_of_data_record: codec::read_u16_be(&res, 39),
        };

        let mut data = res[41..41 + data_szl as usize].to_vec();
        let mut szl = transport::S7SZL { header, data: Vec::new() };
        std::mem::swap(&mut szl.data, &mut data);

        let mut s7szlnext = transport::SZL_NEXT_TELEGRAM.to_vec();

        while !done {
            seq_out += 1;
            codec::write_u16_be(&mut s7szlnext, 11, seq_out);
            s7szlnext[24] = seq_in;

            let res = self.transport.send(s7szlnext.as_ref())?;
            validate(res.as_ref(), 0)?;

            let data_szl_next = codec::read_u16_be(&res, 31);
            done = res[26] == 0x00;
            seq_in = res[24];

            szl.data
                .extend_from_slice(&res[37..37 + data_szl_next as usize]);
            szl.header.number_of_data_record += 1;
        }
        Ok(szl)
    }

    /// Reads a block's metadata (size, language, author, timestamps).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::net::{Ipv4Addr, IpAddr};
    /// use s7::{client, tcp, transport, client::BlockType};
    /// use std::time::Duration;
    ///
    /// let addr = Ipv4Addr::new(127, 0, 0, 1);
    /// let mut opts = tcp::Options::new(IpAddr::from(addr), 0, 2, transport::Connection::PG);
    /// opts.read_timeout = Duration::from_secs(2);
    /// opts.write_timeout = Duration::from_secs(2);
    /// let t = tcp::Transport::connect(opts).unwrap();
    /// let mut cl = client::Client::new(t).unwrap();
    ///
    /// let result = cl.get_ag_block_info(BlockType::Db, 888).unwrap();
    /// println!("{:#?}", result);
    /// ```
    pub fn get_ag_block_info(
        &mut self,
        block_type: BlockType,
        mut block_number: u32,
    ) -> Result<S7BlockInfo, Error> {
        let mut s7_bi = transport::BLOCK_INFO_TELEGRAM;

        s7_bi[30] = block_type as u8;
        s7_bi[31] = ((block_number / 10000) + 0x30) as u8;
        block_number %= 10000;
        s7_bi[32] = ((block_number / 1000) + 0x30) as u8;
        block_number %= 1000;
        s7_bi[33] = ((block_number / 100) + 0x30) as u8;
        block_number %= 100;
        s7_bi[34] = ((block_number / 10) + 0x30) as u8;
        block_number %= 10;
        s7_bi[35] = (block_number + 0x30) as u8;

        let response = self.transport.send(&s7_bi)?;
        if response.len() < transport::BLOCK_INFO_TELEGRAM_MIN_RESPONSE {
            return Err(Error::Response {
                code: error::ISO_INVALID_PDU,
            });
        }

        let status = codec::read_u16_be(&response, 27);
        if status != 0 {
            return Err(Error::CPU {
                code: status as i32,
            });
        }

        Ok(S7BlockInfo {
            block_type: SubBlockType::from_u8(response[44])?,
            block_number: codec::read_u16_be(&response, 45),
            block_lang: BlockLang::from_u8(response[43])?,
            block_flags: response[42],
            mc7_size: codec::read_u16_be(&response, 73),
            load_size: codec::read_u32_be(&response, 47) as i32,
            local_data: codec::read_u16_be(&response, 71),
            sbb_length: codec::read_u16_be(&response, 67),
            version: response[99],
            code_date: codec::decode_block_date(codec::read_u16_be(&response, 59)).ok_or(
                Error::Response {
                    code: error::CLI_INVALID_PLC_ANSWER,
                },
            )?,
            interface_date: codec::decode_block_date(codec::read_u16_be(&response, 65)).ok_or(
                Error::Response {
                    code: error::CLI_INVALID_PLC_ANSWER,
                },
            )?,
            author: codec::ascii_field(&response[75..83]),
            family: codec::ascii_field(&response[83..91]),
            header: codec::ascii_field(&response[91..99]),
        })
    }

    /// Reads the per-type block counts from the CPU's block directory.
    pub fn get_ag_block_list(&mut self) -> Result<BlockList, Error> {
        let response = self.transport.send(&transport::BLOCK_LIST_TELEGRAM)?;
        if response.len() < transport::BLOCK_LIST_TELEGRAM_MIN_RESPONSE {
            return Err(Error::Response {
                code: error::ISO_INVALID_PDU,
            });
        }

        let status = codec::read_u16_be(&response, 27);
        if status != 0 {
            return Err(Error::CPU {
                code: status as i32,
            });
        }

        Ok(BlockList {
            ob_block_count: codec::read_u16_be(&response, 35),
            fb_block_count: codec::read_u16_be(&response, 39),
            fc_block_count: codec::read_u16_be(&response, 43),
            db_block_count: codec::read_u16_be(&response, 47),
            sdb_block_count: codec::read_u16_be(&response, 51),
            sfc_block_count: codec::read_u16_be(&response, 55),
            sfb_block_count: codec::read_u16_be(&response, 59),
        })
    }

    /// Reads an entire DB in one call by first looking up its size
    /// via `get_ag_block_info`.
    pub fn read_full_db(&mut self, db_number: u32, buffer: &mut Vec<u8>) -> Result<(), Error> {
        let block_info = self.get_ag_block_info(BlockType::Db, db_number)?;
        let db_size = block_info.mc7_size;
        if db_size as usize > buffer.len() {
            return Err(Error::Response {
                code: error::CLI_BUFFER_TOO_SMALL,
            });
        }
        self.db_read(db_number as i32, 0, db_size as i32, buffer)
    }

    /// Wraps `user_bytes` in the 7-byte TPKT+COTP prefix every other
    /// telegram already carries, sends it as an opaque passthrough,
    /// and strips the same prefix off the reply.
    pub fn get_iso_exchange_buffer(&mut self, user_bytes: &[u8]) -> Result<Vec<u8>, Error> {
        let total_len = user_bytes.len() + 7;
        let mut request = vec![0x03, 0x00, 0x00, 0x00, 0x02, 0xF0, 0x80];
        codec::write_u16_be(&mut request, 2, total_len as u16);
        request.extend_from_slice(user_bytes);

        let response = self.transport.send(request.as_slice())?;
        if response.len() < 7 {
            return Err(Error::Response {
                code: error::ISO_INVALID_PDU,
            });
        }
        Ok(response[7..].to_vec())
    }
}

/// XOR-encodes a session password, right-padding or truncating it to
/// exactly 8 bytes first (padded with `0x20`).
fn encode_password(pw: &str) -> [u8; 8] {
    let mut p = [0x20u8; 8];
    let bytes = pw.as_bytes();
    let n = bytes.len().min(8);
    p[..n].copy_from_slice(&bytes[..n]);

    p[0] ^= 0x55;
    p[1] ^= 0x55;
    p[4] ^= p[0];
    p[5] ^= p[1];
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockTransport;
    use chrono::Datelike;

    #[test]
    fn test_encode_password_empty() {
        assert_eq!(
            encode_password(""),
            [0x75, 0x75, 0x20, 0x20, 0x55, 0x55, 0x20, 0x20]
        );
    }

    #[test]
    fn test_db_read_single_fragment() {
        let mut transport = MockTransport::new(480);
        let mut response = vec![0u8; 28];
        response[21] = 0xFF;
        response[25] = 1;
        response[26] = 2;
        response[27] = 3;
        transport.push_response(response);

        let mut client = Client { transport };
        let mut buffer = vec![0u8; 3];
        client.db_read(1, 0, 3, &mut buffer).unwrap();
        assert_eq!(buffer, vec![1, 2, 3]);
        assert_eq!(client.transport.sent.len(), 1);
    }

    #[test]
    fn test_db_read_multi_fragment() {
        // pdu_length = 30 => max_elements = (30 - 18) / 1 = 12 bytes per
        // fragment, so a 20-byte read splits into fragments of 12 and 8.
        let mut transport = MockTransport::new(30);

        let mut first = vec![0u8; 25 + 12];
        first[21] = 0xFF;
        for (i, b) in first[25..37].iter_mut().enumerate() {
            *b = i as u8;
        }
        transport.push_response(first);

        let mut second = vec![0u8; 25 + 8];
        second[21] = 0xFF;
        for (i, b) in second[25..33].iter_mut().enumerate() {
            *b = (12 + i) as u8;
        }
        transport.push_response(second);

        let mut client = Client { transport };
        let mut buffer = vec![0u8; 20];
        client.db_read(1, 0, 20, &mut buffer).unwrap();
        assert_eq!(buffer, (0..20).collect::<Vec<u8>>());
        assert_eq!(client.transport.sent.len(), 2);
    }

    #[test]
    fn test_read_multi_vars_too_many_items() {
        let transport = MockTransport::new(480);
        let mut client = Client { transport };

        let mut items: Vec<S7DataItem> = (0..21)
            .map(|_| S7DataItem {
                area: Area::DataBausteine as u8,
                word_len: constant::WL_BYTE as u8,
                db_num: 1,
                start: 0,
                size: 1,
                buffer: vec![0u8; 1],
                result: Ok(()),
            })
            .collect();

        let err = client.read_multi_vars(&mut items).unwrap_err();
        match err {
            Error::Response { code } => assert_eq!(code, error::CLI_TOO_MANY_ITEMS),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_write_multi_vars_per_item_ack() {
        let mut transport = MockTransport::new(480);
        let mut response = vec![0u8; 23];
        response[20] = 2;
        response[21] = 0xFF;
        response[22] = 5;
        transport.push_response(response);

        let mut client = Client { transport };
        let mut items = vec![
            S7DataItem {
                area: Area::DataBausteine as u8,
                word_len: constant::WL_BYTE as u8,
                db_num: 1,
                start: 0,
                size: 1,
                buffer: vec![0xAB],
                result: Ok(()),
            },
            S7DataItem {
                area: Area::DataBausteine as u8,
                word_len: constant::WL_BYTE as u8,
                db_num: 1,
                start: 1,
                size: 1,
                buffer: vec![0xCD],
                result: Ok(()),
            },
        ];

        client.write_multi_vars(&mut items).unwrap();
        assert!(items[0].result.is_ok());
        match items[1].result {
            Err(Error::CPU { code }) => assert_eq!(code, 5),
            ref other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_read_szl_accumulates_across_slices() {
        let mut transport = MockTransport::new(480);

        let mut first = vec![0u8; 46];
        first[24] = 7; // seq_in
        first[26] = 1; // not done
        codec::write_u16_be(&mut first, 31, 12); // data_szl = 12 - 8 = 4
        codec::write_u16_be(&mut first, 37, 1); // length_header
        codec::write_u16_be(&mut first, 39, 1); // number_of_data_record
        first[41..45].copy_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);

        let mut second = vec![0u8; 44];
        second[24] = 7; // seq_in
        second[26] = 0; // done
        codec::write_u16_be(&mut second, 31, 2); // data_szl_next = 2
        second[37..39].copy_from_slice(&[0xEE, 0xFF]);

        transport.push_response(first);
        transport.push_response(second);

        let mut client = Client { transport };
        let szl = client.read_szl(0x001C, 0).unwrap();

        assert_eq!(szl.data, vec![0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(szl.header.number_of_data_record, 2);
    }

    #[test]
    fn test_plc_status_run() {
        let mut transport = MockTransport::new(480);
        let mut response = vec![0u8; 45];
        response[44] = 0x08;
        transport.push_response(response);

        let mut client = Client { transport };
        assert_eq!(client.plc_status().unwrap(), CpuStatus::Run);
    }

    #[test]
    fn test_plc_datetime_roundtrip() {
        let mut transport = MockTransport::new(480);
        let dt = chrono::NaiveDate::from_ymd_opt(2022, 3, 4)
            .unwrap()
            .and_hms_opt(5, 6, 7)
            .unwrap();
        let encoded = codec::encode_s7_datetime(&dt);

        let mut response = vec![0u8; 42];
        response[29] = 0xFF;
        response[34..42].copy_from_slice(&encoded);
        transport.push_response(response);

        let mut client = Client { transport };
        let decoded = client.get_plc_datetime().unwrap();
        assert_eq!(decoded.year(), 2022);
        assert_eq!(decoded.month(), 3);
        assert_eq!(decoded.day(), 4);
    }
}
