/// Everything a program can observe or change outside of its own reduction: the input
/// still to be read, the output written so far, and the current character register.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoContext {
    input: Vec<char>,
    cursor: usize,
    output: String,
    current: Option<char>,
}

impl IoContext {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            cursor: 0,
            output: String::new(),
            current: None,
        }
    }

    /// Reads the next input character into the current character register. At the end
    /// of input the register is cleared instead and `None` comes back.
    pub fn read(&mut self) -> Option<char> {
        self.current = self.input.get(self.cursor).copied();

        if self.current.is_some() {
            self.cursor += 1;
        }

        self.current
    }

    pub fn write(&mut self, c: char) {
        self.output.push(c);
    }

    /// The character most recently read, if the last read succeeded
    pub fn current(&self) -> Option<char> {
        self.current
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }

    pub fn remaining_input(&self) -> String {
        self.input[self.cursor..].iter().collect()
    }
}
