use crate::CharstringError;

/// The charstring operand stack.
///
/// Overflow and underflow are reported to the caller instead of being
/// silently truncated.
pub(crate) struct ArgumentsStack<'a> {
    pub data: &'a mut [f32],
    pub len: usize,
}

impl ArgumentsStack<'_> {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub(crate) fn push(&mut self, n: f32) -> Result<(), CharstringError> {
        if self.len == self.data.len() {
            Err(CharstringError::StackOverflow)
        } else {
            self.data[self.len] = n;
            self.len += 1;
            Ok(())
        }
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Result<f32, CharstringError> {
        if self.is_empty() {
            Err(CharstringError::StackUnderflow)
        } else {
            self.len -= 1;
            Ok(self.data[self.len])
        }
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    pub(crate) fn dump(&self) -> String {
        format!("{:?}", &self.data[0..self.len])
    }
}

impl core::fmt::Debug for ArgumentsStack<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(&self.data[..self.len]).finish()
    }
}

/// The 3-slot auxiliary stack used by the `callothersubr`/`pop` callback
/// convention.
///
/// Hinting side channel only, so misuse is tolerated: pushes beyond the
/// capacity are dropped and an empty pop yields zero.
#[derive(Debug, Default)]
pub(crate) struct AuxStack {
    data: [f32; 3],
    len: usize,
}

impl AuxStack {
    #[inline]
    pub(crate) fn push(&mut self, n: f32) {
        if self.len == self.data.len() {
            log::debug!("othersubr stack is full, dropping {n}");
        } else {
            self.data[self.len] = n;
            self.len += 1;
        }
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> f32 {
        if self.len == 0 {
            log::debug!("pop from an empty othersubr stack");
            0.0
        } else {
            self.len -= 1;
            self.data[self.len]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_stack_bounds() {
        let mut data = [0.0; 2];
        let mut stack = ArgumentsStack {
            data: &mut data,
            len: 0,
        };

        assert_eq!(stack.pop(), Err(CharstringError::StackUnderflow));
        assert_eq!(stack.push(1.0), Ok(()));
        assert_eq!(stack.push(2.0), Ok(()));
        assert_eq!(stack.push(3.0), Err(CharstringError::StackOverflow));
        assert_eq!(stack.pop(), Ok(2.0));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn aux_stack_is_tolerant() {
        let mut aux = AuxStack::default();
        assert_eq!(aux.pop(), 0.0);

        for v in 0..4 {
            aux.push(v as f32);
        }

        // The fourth push was dropped.
        assert_eq!(aux.pop(), 2.0);
        assert_eq!(aux.pop(), 1.0);
        assert_eq!(aux.pop(), 0.0);
    }
}
