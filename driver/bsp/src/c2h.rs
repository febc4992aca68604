//! C2H 帧解码
//!
//! 帧布局：4 字节小端头 + payload
//!
//! ```text
//!  31 30    24 23      16 15               0
//! +--+--------+----------+------------------+
//! |  |  seq   |   code   |       len        |   payload[len] ...
//! +--+--------+----------+------------------+
//! ```
//!
//! payload 内容对本层不透明。解码只做长度校验：声明长度超出实际缓冲即为畸形帧，绝不越界读取。
//!
//! 例外是 H2C 响应：payload 前 2 字节回显所响应命令的 cmd_seq（第 2 字节保留），之后才是响应数据。

use crate::cmd::{Code, MAX_EVTSZ};
use crate::error::CmdError;

/// C2H 头长度
pub const C2H_HDR_LEN: usize = 4;
/// 事件序号位宽 7 bit
pub const C2H_SEQ_MASK: u8 = 0x7f;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct C2hHeader {
    pub len: u16,
    pub code: u8,
    pub seq: u8,
}

impl C2hHeader {
    #[inline]
    pub fn from_word(word: u32) -> Self {
        Self {
            len: (word & 0xffff) as u16,
            code: ((word >> 16) & 0xff) as u8,
            seq: ((word >> 24) as u8) & C2H_SEQ_MASK,
        }
    }

    #[inline]
    pub fn to_word(&self) -> u32 {
        self.len as u32 | (self.code as u32) << 16 | ((self.seq & C2H_SEQ_MASK) as u32) << 24
    }
}

/// 解码后的事件，payload 借用自原始帧（延迟路径下借用自 EvtObj）
#[derive(Debug, Clone, Copy)]
pub struct C2hEvent<'a, E: Code> {
    pub code: E,
    pub seq: u8,
    pub payload: &'a [u8],
}

/// 拆出帧头与 payload，并做长度校验
pub fn parse_c2h_frame(buf: &[u8]) -> Result<(C2hHeader, &[u8]), CmdError> {
    let hdr_bytes: [u8; C2H_HDR_LEN] = buf
        .get(..C2H_HDR_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or(CmdError::MalformedEvent {
            declared: C2H_HDR_LEN,
            available: buf.len(),
        })?;
    let hdr = C2hHeader::from_word(u32::from_le_bytes(hdr_bytes));
    let len = hdr.len as usize;
    let body = &buf[C2H_HDR_LEN..];
    if len > MAX_EVTSZ {
        return Err(CmdError::MalformedEvent {
            declared: len,
            available: body.len().min(MAX_EVTSZ),
        });
    }
    let payload = body.get(..len).ok_or(CmdError::MalformedEvent {
        declared: len,
        available: body.len(),
    })?;
    Ok((hdr, payload))
}

/// H2C 响应头长度：cmd_seq + 保留字节
pub const H2C_RSP_HDR_LEN: usize = 2;

/// 拆出 H2C 响应回显的 cmd_seq 与响应数据；不足头长返回 None
pub fn parse_h2c_rsp(payload: &[u8]) -> Option<(u8, &[u8])> {
    match payload {
        [cmd_seq, _rsvd, data @ ..] => Some((*cmd_seq, data)),
        _ => None,
    }
}

/// 组 H2C 响应 payload（固件侧格式）
pub fn build_h2c_rsp(cmd_seq: u8, data: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(H2C_RSP_HDR_LEN + data.len());
    payload.extend_from_slice(&[cmd_seq, 0]);
    payload.extend_from_slice(data);
    payload
}

/// 组帧（固件侧格式），供 transport 模拟与测试使用
///
/// # Panics
///
/// payload 超过 16 位长度字段（65535 字节）时 panic。
pub fn build_c2h_frame(code: u8, seq: u8, payload: &[u8]) -> Vec<u8> {
    assert!(
        payload.len() <= u16::MAX as usize,
        "c2h payload of {} bytes does not fit the length field",
        payload.len()
    );
    let hdr = C2hHeader {
        len: payload.len() as u16,
        code,
        seq,
    };
    let mut frame = Vec::with_capacity(C2H_HDR_LEN + payload.len());
    frame.extend_from_slice(&hdr.to_word().to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let frame = build_c2h_frame(0x0a, 0x85, &[1, 2, 3]);
        assert_eq!(&frame[..4], &[3, 0, 0x0a, 0x05]);
        let (hdr, payload) = parse_c2h_frame(&frame).unwrap();
        assert_eq!(hdr, C2hHeader { len: 3, code: 0x0a, seq: 0x05 });
        assert_eq!(payload, &[1, 2, 3]);
    }

    #[test]
    fn trailing_bytes_are_not_payload() {
        let mut frame = build_c2h_frame(1, 0, &[9, 9]);
        frame.extend_from_slice(&[0xee; 8]);
        let (_, payload) = parse_c2h_frame(&frame).unwrap();
        assert_eq!(payload, &[9, 9]);
    }

    #[test]
    fn declared_length_past_buffer_is_malformed() {
        let mut frame = build_c2h_frame(1, 0, &[0u8; 16]);
        frame.truncate(C2H_HDR_LEN + 10);
        assert_eq!(
            parse_c2h_frame(&frame),
            Err(CmdError::MalformedEvent { declared: 16, available: 10 })
        );
    }

    #[test]
    fn short_header_is_malformed() {
        assert_eq!(
            parse_c2h_frame(&[1, 2]),
            Err(CmdError::MalformedEvent { declared: 4, available: 2 })
        );
    }

    #[test]
    #[should_panic]
    fn payload_past_length_field_is_rejected() {
        let _ = build_c2h_frame(1, 0, &vec![0u8; u16::MAX as usize + 1]);
    }

    #[test]
    fn h2c_rsp_carries_cmd_seq() {
        let payload = build_h2c_rsp(0x2a, &[7, 8]);
        assert_eq!(payload, vec![0x2a, 0, 7, 8]);
        assert_eq!(parse_h2c_rsp(&payload), Some((0x2a, &[7u8, 8][..])));
        assert_eq!(parse_h2c_rsp(&[0x2a, 0]), Some((0x2a, &[0u8; 0][..])));
        assert_eq!(parse_h2c_rsp(&[1]), None);
    }

    #[test]
    fn oversized_length_is_malformed() {
        let word = C2hHeader { len: (MAX_EVTSZ + 1) as u16, code: 0, seq: 0 }.to_word();
        let mut frame = word.to_le_bytes().to_vec();
        frame.resize(C2H_HDR_LEN + MAX_EVTSZ + 1, 0);
        assert!(matches!(parse_c2h_frame(&frame), Err(CmdError::MalformedEvent { .. })));
    }
}
