/**
 * \brief 交互模式下一行输入的含义。
 */
#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    Send(&'a str),
    Clear,
    History,
    /** \brief 不带参数时列出可选 Provider */
    Provider(Option<&'a str>),
    Help,
    Quit,
}

impl<'a> ReplCommand<'a> {
    /**
     * \brief 以 "/" 开头的是命令，其余原样作为消息发送（空行交给控制器忽略）。
     */
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.strip_prefix('/') else {
            return ReplCommand::Send(line);
        };
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());
        match name {
            "quit" | "exit" => ReplCommand::Quit,
            "clear" => ReplCommand::Clear,
            "history" => ReplCommand::History,
            "provider" => ReplCommand::Provider(arg),
            _ => ReplCommand::Help,
        }
    }
}

pub const HELP: &str = "commands: /provider [name], /clear, /history, /quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_sent_verbatim() {
        assert_eq!(ReplCommand::parse("Hello\n"), ReplCommand::Send("Hello"));
        assert_eq!(ReplCommand::parse("  spaced  "), ReplCommand::Send("  spaced  "));
        assert_eq!(ReplCommand::parse(""), ReplCommand::Send(""));
    }

    #[test]
    fn slash_commands() {
        assert_eq!(ReplCommand::parse("/quit"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/exit\r\n"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/clear"), ReplCommand::Clear);
        assert_eq!(ReplCommand::parse("/history"), ReplCommand::History);
        assert_eq!(ReplCommand::parse("/provider"), ReplCommand::Provider(None));
        assert_eq!(
            ReplCommand::parse("/provider  anthropic "),
            ReplCommand::Provider(Some("anthropic"))
        );
        assert_eq!(ReplCommand::parse("/wat"), ReplCommand::Help);
    }
}
