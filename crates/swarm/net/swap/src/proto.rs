//! Protobuf messages for the SWAP protocols.

pub mod headers {
    use quick_protobuf::{
        BytesReader, MessageRead, MessageWrite, Result, Writer, WriterBackend, sizeofs::sizeof_len,
    };

    #[derive(Debug, Default, PartialEq, Clone)]
    pub struct Headers {
        pub headers: Vec<Header>,
    }

    impl<'a> MessageRead<'a> for Headers {
        fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self> {
            let mut msg = Self::default();
            while !r.is_eof() {
                match r.next_tag(bytes) {
                    Ok(10) => msg.headers.push(r.read_message::<Header>(bytes)?),
                    Ok(t) => {
                        r.read_unknown(bytes, t)?;
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(msg)
        }
    }

    impl MessageWrite for Headers {
        fn get_size(&self) -> usize {
            self.headers
                .iter()
                .map(|h| 1 + sizeof_len(h.get_size()))
                .sum::<usize>()
        }

        fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> Result<()> {
            for h in &self.headers {
                w.write_with_tag(10, |w| w.write_message(h))?;
            }
            Ok(())
        }
    }

    #[derive(Debug, Default, PartialEq, Clone)]
    pub struct Header {
        pub key: String,
        pub value: Vec<u8>,
    }

    impl<'a> MessageRead<'a> for Header {
        fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self> {
            let mut msg = Self::default();
            while !r.is_eof() {
                match r.next_tag(bytes) {
                    Ok(10) => msg.key = r.read_string(bytes)?.to_owned(),
                    Ok(18) => msg.value = r.read_bytes(bytes)?.to_owned(),
                    Ok(t) => {
                        r.read_unknown(bytes, t)?;
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(msg)
        }
    }

    impl MessageWrite for Header {
        fn get_size(&self) -> usize {
            let key = if self.key.is_empty() { 0 } else { 1 + sizeof_len(self.key.len()) };
            let value = if self.value.is_empty() { 0 } else { 1 + sizeof_len(self.value.len()) };
            key + value
        }

        fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> Result<()> {
            if !self.key.is_empty() {
                w.write_with_tag(10, |w| w.write_string(&self.key))?;
            }
            if !self.value.is_empty() {
                w.write_with_tag(18, |w| w.write_bytes(&self.value))?;
            }
            Ok(())
        }
    }
}

pub mod swap {
    use quick_protobuf::{
        BytesReader, MessageRead, MessageWrite, Result, Writer, WriterBackend, sizeofs::sizeof_len,
    };

    #[derive(Debug, Default, PartialEq, Clone)]
    pub struct EmitCheque {
        pub cheque: Vec<u8>,
    }

    impl<'a> MessageRead<'a> for EmitCheque {
        fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self> {
            let mut msg = Self::default();
            while !r.is_eof() {
                match r.next_tag(bytes) {
                    Ok(10) => msg.cheque = r.read_bytes(bytes)?.to_owned(),
                    Ok(t) => {
                        r.read_unknown(bytes, t)?;
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(msg)
        }
    }

    impl MessageWrite for EmitCheque {
        fn get_size(&self) -> usize {
            if self.cheque.is_empty() { 0 } else { 1 + sizeof_len(self.cheque.len()) }
        }

        fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> Result<()> {
            if !self.cheque.is_empty() {
                w.write_with_tag(10, |w| w.write_bytes(&self.cheque))?;
            }
            Ok(())
        }
    }

    #[derive(Debug, Default, PartialEq, Clone)]
    pub struct Handshake {
        pub beneficiary: Vec<u8>,
    }

    impl<'a> MessageRead<'a> for Handshake {
        fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self> {
            let mut msg = Self::default();
            while !r.is_eof() {
                match r.next_tag(bytes) {
                    Ok(10) => msg.beneficiary = r.read_bytes(bytes)?.to_owned(),
                    Ok(t) => {
                        r.read_unknown(bytes, t)?;
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(msg)
        }
    }

    impl MessageWrite for Handshake {
        fn get_size(&self) -> usize {
            if self.beneficiary.is_empty() { 0 } else { 1 + sizeof_len(self.beneficiary.len()) }
        }

        fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> Result<()> {
            if !self.beneficiary.is_empty() {
                w.write_with_tag(10, |w| w.write_bytes(&self.beneficiary))?;
            }
            Ok(())
        }
    }
}
