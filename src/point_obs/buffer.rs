//! Bounded staging buffer for observation rows.

/// Parallel observation columns awaiting a flush
#[derive(Debug, Clone)]
pub struct ObservationBuffer {
    capacity: usize,
    header_index: Vec<i32>,
    variable_id: Vec<i32>,
    quality_index: Vec<i32>,
    level: Vec<f32>,
    height: Vec<f32>,
    value: Vec<f32>,
    /// Rows already flushed; the next flush starts here
    offset: usize,
    flushes: usize,
}

impl ObservationBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let reserve = capacity.min(crate::constants::DEFAULT_OBS_BUFFER_SIZE);
        Self {
            capacity,
            header_index: Vec::with_capacity(reserve),
            variable_id: Vec::with_capacity(reserve),
            quality_index: Vec::with_capacity(reserve),
            level: Vec::with_capacity(reserve),
            height: Vec::with_capacity(reserve),
            value: Vec::with_capacity(reserve),
            offset: 0,
            flushes: 0,
        }
    }

    /// Append one row; returns true once the buffer has reached capacity
    pub fn push(
        &mut self,
        header_index: i32,
        variable_id: i32,
        quality_index: i32,
        level: f32,
        height: f32,
        value: f32,
    ) -> bool {
        self.header_index.push(header_index);
        self.variable_id.push(variable_id);
        self.quality_index.push(quality_index);
        self.level.push(level);
        self.height.push(height);
        self.value.push(value);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Rows currently staged
    pub fn len(&self) -> usize {
        self.header_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.header_index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// First on-disk row of the staged batch
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Rows flushed plus rows staged
    pub fn total_rows(&self) -> usize {
        self.offset + self.len()
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn header_indices(&self) -> &[i32] {
        &self.header_index
    }

    pub fn variable_ids(&self) -> &[i32] {
        &self.variable_id
    }

    pub fn quality_indices(&self) -> &[i32] {
        &self.quality_index
    }

    pub fn levels(&self) -> &[f32] {
        &self.level
    }

    pub fn heights(&self) -> &[f32] {
        &self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.value
    }

    /// Mark the staged rows as written: advance the offset and reset the fill count
    pub fn advance(&mut self) {
        self.offset += self.len();
        self.flushes += 1;
        self.header_index.clear();
        self.variable_id.clear();
        self.quality_index.clear();
        self.level.clear();
        self.height.clear();
        self.value.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_reports_full_at_capacity() {
        let mut buffer = ObservationBuffer::new(2);
        assert!(!buffer.push(0, 11, 0, 1000.0, 2.0, 1.5));
        assert!(buffer.push(0, 12, 0, 1000.0, 2.0, 2.5));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.values(), &[1.5, 2.5]);
    }

    #[test]
    fn test_advance_moves_offset() {
        let mut buffer = ObservationBuffer::new(3);
        buffer.push(0, 1, 0, 0.0, 0.0, 0.0);
        buffer.push(1, 1, 0, 0.0, 0.0, 0.0);
        buffer.advance();

        assert!(buffer.is_empty());
        assert_eq!(buffer.offset(), 2);
        assert_eq!(buffer.flushes(), 1);

        buffer.push(2, 1, 0, 0.0, 0.0, 0.0);
        assert_eq!(buffer.total_rows(), 3);
        assert_eq!(buffer.header_indices(), &[2]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let buffer = ObservationBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
    }
}
