//! SSE 解码器
//!
//! 把任意切分的字节块还原为 SSE 事件的 `data` 负载。
//! 兼容 `\r\n` 行尾；`event:`、`id:`、`retry:` 与注释行被忽略；
//! 同一事件的多行 `data:` 以 `\n` 拼接。

/// SSE 增量解码器
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 输入一个字节块，返回其中完整事件的 data
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(data) = self.process_line(&line) {
                out.push(data);
            }
        }
        out
    }

    /// 流结束，返回残留的最后一个事件（没有以空行结尾的情况）
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let mut rest = std::mem::take(&mut self.pending);
            if rest.last() == Some(&b'\r') {
                rest.pop();
            }
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(data) = self.process_line(&line) {
                return Some(data);
            }
        }
        self.flush()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.flush();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let value = rest.strip_prefix(' ').unwrap_or(rest);
            self.data_lines.push(value.to_string());
        }
        None
    }

    fn flush(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(data)
    }
}
