use bidwise_llm::Message;

pub const ANALYST_SYSTEM_PROMPT: &str = "\
당신은 RFP(제안요청서) 문서 분석 전문가입니다.
제공된 문서 컨텍스트를 기반으로 사용자의 질문에 정확하고 상세하게 답변하세요.

규칙:
1. 반드시 제공된 컨텍스트만을 기반으로 답변하세요.
2. 컨텍스트에 없는 정보는 추측하지 말고 \"문서에 명시되지 않음\"이라고 명시하세요.
3. 답변의 출처를 명확히 표시하세요 (문서 ID, 섹션명 등).
4. 한국어로 자연스럽고 전문적으로 답변하세요.";

/// Returned without an LLM call when no evidence was retrieved.
pub const INSUFFICIENT_INFO_ANSWER: &str =
    "제공된 문서에서 질문에 답할 수 있는 충분한 정보를 찾지 못했습니다.";

pub const DEGRADED_ANSWER_PREFIX: &str =
    "답변을 생성하지 못했습니다. 검색된 관련 문서 발췌는 다음과 같습니다:";

#[must_use]
pub fn hyde(question: &str, attempt: u32) -> Vec<Message> {
    let angle = if attempt == 0 {
        String::new()
    } else {
        format!(
            "\n이전 {attempt}회의 검색으로는 충분한 근거를 찾지 못했습니다. \
             다른 관점과 다른 전문 용어를 사용해 작성하세요."
        )
    };
    vec![Message::user(format!(
        "당신은 RFP 분석 전문가입니다. 다음 질문에 대해 상세하고 기술적인 답변을 작성하세요.{angle}\n\n질문: {question}"
    ))]
}

#[must_use]
pub fn grade(context: &str, question: &str) -> Vec<Message> {
    vec![Message::user(format!(
        "제공된 [문맥]이 [질문]에 답변하기에 충분하고 구체적인 정보를 포함하고 있습니까? \
         반드시 'yes' 또는 'no'로만 대답하세요.\n\n[문맥]: {context}\n\n[질문]: {question}"
    ))]
}

#[must_use]
pub fn answer(context: &str, question: &str) -> Vec<Message> {
    vec![
        Message::system(ANALYST_SYSTEM_PROMPT),
        Message::user(format!(
            "다음은 RFP 문서의 관련 부분입니다:\n\n{context}\n\n사용자 질문: {question}\n\n\
             위 컨텍스트를 기반으로 질문에 답변하세요. 답변 끝에 출처를 명시하세요."
        )),
    ]
}

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "당신은 RFP 문서 요약 전문가입니다. 문서의 핵심 정보를 간결하고 명확하게 요약하세요.";

pub const EXTRACTION_SYSTEM_PROMPT: &str = "당신은 RFP 문서에서 구조화된 정보를 추출하는 전문가입니다. \
     요청된 스키마에 맞춰 JSON 형식으로만 답변하세요.";

#[must_use]
pub fn summary(context: &str) -> Vec<Message> {
    vec![
        Message::system(SUMMARY_SYSTEM_PROMPT),
        Message::user(format!(
            "다음은 RFP 문서의 내용입니다. 핵심 정보를 요약하세요.\n\n문서 내용:\n{context}\n\n\
             다음 항목을 포함하여 요약하세요:\n\
             1. 사업 개요 (3-4줄)\n\
             2. 주요 요구사항 (불릿 포인트)\n\
             3. 예산 정보\n\
             4. 마감일 및 일정\n\
             5. 필수 자격 요건\n\n요약:"
        )),
    ]
}

#[must_use]
pub fn extraction(context: &str, schema: &str) -> Vec<Message> {
    vec![
        Message::system(EXTRACTION_SYSTEM_PROMPT),
        Message::user(format!(
            "다음 문서에서 요청한 정보를 추출하여 JSON 형식으로만 답변하세요.\n\n\
             문서 내용:\n{context}\n\n추출할 정보 스키마:\n{schema}\n\n\
             JSON 형식으로만 답변하세요. 정보가 없으면 null을 사용하세요."
        )),
    ]
}
